use proptest::prelude::*;

use monitor_core::{LogBuffer, LogCategory, DEFAULT_LOG_CAPACITY};

fn category(index: u8) -> LogCategory {
    match index % 6 {
        0 => LogCategory::Info,
        1 => LogCategory::Success,
        2 => LogCategory::Error,
        3 => LogCategory::Warning,
        4 => LogCategory::Buy,
        _ => LogCategory::Sell,
    }
}

proptest! {
    #[test]
    fn size_never_exceeds_capacity(categories in prop::collection::vec(any::<u8>(), 0..200)) {
        let mut buffer = LogBuffer::new();
        for (i, c) in categories.iter().enumerate() {
            buffer.record(format!("entry {}", i), category(*c));
            prop_assert!(buffer.len() <= DEFAULT_LOG_CAPACITY);
        }
        prop_assert_eq!(buffer.len(), categories.len().min(DEFAULT_LOG_CAPACITY));
    }

    #[test]
    fn entries_are_newest_first(count in 1usize..150, capacity in 1usize..80) {
        let mut buffer = LogBuffer::with_capacity(capacity);
        for i in 0..count {
            buffer.record(format!("entry {}", i), LogCategory::Info);
        }

        let ids: Vec<u64> = buffer.iter().map(|e| e.id()).collect();
        prop_assert!(ids.windows(2).all(|w| w[0] > w[1]));

        // Retained entries are exactly the most recent ones
        let expected: Vec<String> = (count.saturating_sub(capacity)..count)
            .rev()
            .map(|i| format!("entry {}", i))
            .collect();
        let actual: Vec<String> = buffer.iter().map(|e| e.message().to_string()).collect();
        prop_assert_eq!(actual, expected);
    }
}

#[test]
fn fifty_one_appends_evict_the_first() {
    let mut buffer = LogBuffer::new();
    let first_id = buffer.record("first", LogCategory::Info).id();
    for i in 1..51 {
        buffer.record(format!("entry {}", i), LogCategory::Info);
    }

    assert_eq!(buffer.len(), 50);
    assert!(buffer.iter().all(|e| e.id() != first_id));
    assert_eq!(buffer.latest().map(|e| e.message()), Some("entry 50"));
}

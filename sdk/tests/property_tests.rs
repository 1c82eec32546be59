use proptest::prelude::*;
use sdk::codec::{decode_inbound, decode_reply, encode_task};
use sdk::errors::{AgentCallError, RelayErrorExt, ValidationError};
use sdk::{concat_parts, Part, Task};
use std::time::Duration;

// Error hints are static and never echo the raw error detail
proptest! {
    #[test]
    fn test_error_user_hint_completeness(error_str in "[a-z0-9 ]{12,40}") {
        let errs = vec![
            AgentCallError::Timeout(Duration::from_secs(1)),
            AgentCallError::ConnectionFailed(error_str.clone()),
            AgentCallError::NonSuccessStatus(500),
            AgentCallError::MalformedBody(error_str.clone()),
            AgentCallError::EmptyMessages,
        ];

        for err in errs {
            let hint = err.user_hint();
            prop_assert!(!hint.is_empty());
            prop_assert!(!hint.contains(&error_str));
        }

        let hint = ValidationError::InvalidJson(error_str.clone()).user_hint().to_string();
        prop_assert!(!hint.contains(&error_str));
    }
}

// A message's text is the in-order concatenation of its parts
proptest! {
    #[test]
    fn test_part_concatenation_preserves_order(texts in prop::collection::vec("\\PC{0,12}", 1..6)) {
        let parts: Vec<Part> = texts.iter().map(Part::text).collect();
        prop_assert_eq!(concat_parts(&parts), texts.concat());
    }
}

// An encoded task is accepted by the inbound decoder with parts intact
proptest! {
    #[test]
    fn test_encoded_task_is_valid_inbound(
        id in "[a-f0-9]{8}",
        texts in prop::collection::vec("\\PC{0,20}", 1..4),
    ) {
        let task = Task::new(id.clone(), texts.iter().map(Part::text).collect());
        let bytes = encode_task(&task).expect("task encodes");

        let decoded = decode_inbound(&bytes)
            .expect("valid json")
            .into_task(|| "unused".to_string())
            .expect("structurally valid");

        prop_assert_eq!(decoded, task);
    }
}

// Reply decoding never panics on arbitrary input
proptest! {
    #[test]
    fn test_decode_reply_total(body in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = decode_reply(&body);
        let _ = decode_inbound(&body);
    }
}

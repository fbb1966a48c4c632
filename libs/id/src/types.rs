//! Typed ID definitions for every identifier the client handles.

use crate::define_key;

// =============================================================================
// Identities and Contexts
// =============================================================================

// Executor public keys double as user ids on the node.
define_key!(UserId, "user id");
define_key!(ContextId, "context id");

// =============================================================================
// Cases and Documents
// =============================================================================

define_key!(CaseId, "case id");
define_key!(DocHash, "document hash");

// =============================================================================
// Payments and Analysis
// =============================================================================

define_key!(PaymentId, "payment id");
define_key!(AnalysisId, "analysis id");
define_key!(CanisterId, "canister id");

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IdError;

    #[test]
    fn test_key_accepts_node_formats() {
        let case = CaseId::new("Merger_1718000000000").unwrap();
        assert_eq!(case.as_str(), "Merger_1718000000000");

        let user = UserId::new("7Vr2b3mZ9Kq8bX1Ns5Tx4c1RkG2vH9dYpQ3Lw6Ez8JfA").unwrap();
        assert_eq!(user.to_string(), "7Vr2b3mZ9Kq8bX1Ns5Tx4c1RkG2vH9dYpQ3Lw6Ez8JfA");
    }

    #[test]
    fn test_key_empty() {
        let result: Result<CaseId, _> = "".parse();
        let err = result.unwrap_err();
        assert!(err.is_empty());
        assert_eq!(err, IdError::EmptyKey("case id"));
    }

    #[test]
    fn test_key_allows_inner_spaces() {
        let case = CaseId::new("Estate Planning_1718000000000").unwrap();
        assert_eq!(case.as_str(), "Estate Planning_1718000000000");
    }

    #[test]
    fn test_key_keeps_surrounding_whitespace() {
        // An untrimmed case name ends up in the id the node issues.
        let case: CaseId = serde_json::from_str("\" Merger_2\"").unwrap();
        assert_eq!(case.as_str(), " Merger_2");
        assert_eq!(serde_json::to_string(&case).unwrap(), "\" Merger_2\"");

        let tabbed = DocHash::new("abc\t").unwrap();
        assert_eq!(tabbed.as_str(), "abc\t");
    }

    #[test]
    fn test_key_json_is_plain_string() {
        let id = ContextId::new("ctx-9f2").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"ctx-9f2\"");
        let parsed: ContextId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_key_deserialize_rejects_empty() {
        let result: Result<PaymentId, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn key_roundtrips_any_visible_string(raw in "[!-~]{1,64}") {
            let key = CaseId::new(raw.clone()).unwrap();
            let json = serde_json::to_string(&key).unwrap();
            let parsed: CaseId = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(parsed.as_str(), raw.as_str());
        }

        #[test]
        fn key_preserves_any_nonempty_value(raw in "\\PC{1,32}") {
            let key = UserId::new(raw.clone()).unwrap();
            prop_assert_eq!(key.into_inner(), raw);
        }
    }
}

crate::define_id_enum! {
    /// Language identifier reported by detection and consumed by workflow generation
    LanguageId {
        Go => "go" : "Go" | "golang",
        Rust => "rust" : "Rust",
        Node => "node" : "Node.js" | "nodejs" | "javascript" | "typescript",
        Python => "python" : "Python",
        Java => "java" : "Java",
        /// No probe matched the context directory
        Unknown => "unknown" : "Unknown",
    }
}

impl LanguageId {
    /// Whether this language takes part in the build matrix.
    pub fn is_detected(&self) -> bool {
        !matches!(self, LanguageId::Unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_id_serialization() {
        assert_eq!(serde_json::to_string(&LanguageId::Go).unwrap(), "\"go\"");
        assert_eq!(serde_json::to_string(&LanguageId::Node).unwrap(), "\"node\"");
        assert_eq!(
            serde_json::to_string(&LanguageId::Unknown).unwrap(),
            "\"unknown\""
        );
    }

    #[test]
    fn test_language_id_deserialization() {
        assert_eq!(
            serde_json::from_str::<LanguageId>("\"rust\"").unwrap(),
            LanguageId::Rust
        );
        assert_eq!(
            serde_json::from_str::<LanguageId>("\"Python\"").unwrap(),
            LanguageId::Python
        );
        assert_eq!(
            serde_json::from_str::<LanguageId>("\"golang\"").unwrap(),
            LanguageId::Go
        );
    }

    #[test]
    fn test_custom_language_round_trip() {
        let custom: LanguageId = serde_json::from_str("\"elixir\"").unwrap();
        assert_eq!(custom, LanguageId::Custom("elixir".to_string()));
        assert!(custom.is_custom());
        assert_eq!(serde_json::to_string(&custom).unwrap(), "\"elixir\"");
    }

    #[test]
    fn test_display_and_name() {
        assert_eq!(LanguageId::Node.to_string(), "node");
        assert_eq!(LanguageId::Node.name(), "Node.js");
    }

    #[test]
    fn test_unknown_is_not_detected() {
        assert!(!LanguageId::Unknown.is_detected());
        assert!(LanguageId::Java.is_detected());
        assert!(LanguageId::Custom("zig".to_string()).is_detected());
    }

    #[test]
    fn test_all_variants_order() {
        let names: Vec<&str> = LanguageId::all_variants()
            .iter()
            .map(|l| l.as_str())
            .collect();
        assert_eq!(names, vec!["go", "rust", "node", "python", "java", "unknown"]);
    }
}

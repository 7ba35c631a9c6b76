//! Unit tests for attribute path decomposition

#[cfg(test)]
mod xpath_steps_tests {
    use featurechain::xpath::{steps, NamespaceContext, Step, XPathError};

    fn namespaces() -> NamespaceContext {
        NamespaceContext::new()
            .with("st", "urn:example:station")
            .with("xlink", "http://www.w3.org/1999/xlink")
    }

    #[test]
    fn test_root_step_is_stripped() {
        let ns = namespaces();
        let root = Step::element(Some("st"), Some("urn:example:station"), "Station");
        let with_root = steps(Some(&root), "st:Station/st:sensors/st:Sensor/st:name", &ns).unwrap();
        let without_root = steps(Some(&root), "st:sensors/st:Sensor/st:name", &ns).unwrap();

        assert_eq!(with_root, without_root);
        assert_eq!(with_root.len(), 3);
        assert_eq!(with_root.to_string(), "st:sensors/st:Sensor/st:name");
    }

    #[test]
    fn test_index_predicate_and_default_index() {
        let ns = namespaces();
        let indexed = steps(None, "st:measurements[1]/st:value", &ns).unwrap();
        let plain = steps(None, "st:measurements/st:value", &ns).unwrap();

        assert!(indexed.contains_predicate());
        assert!(!plain.contains_predicate());
        // [1] is the implicit index
        assert_eq!(indexed, plain);
    }

    #[test]
    fn test_xlink_href() {
        let ns = namespaces();
        let href = steps(None, "st:observer/@xlink:href", &ns).unwrap();
        assert!(href.is_xlink_href());
        assert!(href.is_client_property());
    }

    #[test]
    fn test_invalid_paths() {
        let ns = namespaces();
        assert_eq!(steps(None, "  ", &ns), Err(XPathError::Empty));
        assert!(matches!(
            steps(None, "zz:name", &ns),
            Err(XPathError::UnboundPrefix { .. })
        ));
        assert!(matches!(
            steps(None, "@xlink:href/st:name", &ns),
            Err(XPathError::AttributeNotLast { .. })
        ));
        assert!(steps(None, "st:a//st:b", &ns).is_err());
        assert!(steps(None, "st:a[1", &ns).is_err());
    }
}

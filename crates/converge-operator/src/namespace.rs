use std::fmt;

use kube::Api;

use crate::crd::Topic;

/// The namespaces whose topics the controller reconciles.
///
/// Parsed from `--watch-namespace`, where an empty value selects every namespace.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum WatchNamespace {
    #[default]
    All,
    One(String),
}

impl From<&str> for WatchNamespace {
    fn from(namespace: &str) -> Self {
        match namespace.trim() {
            "" => Self::All,
            namespace => Self::One(namespace.to_owned()),
        }
    }
}

impl fmt::Display for WatchNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("<all>"),
            Self::One(namespace) => f.write_str(namespace),
        }
    }
}

impl WatchNamespace {
    pub fn topics(&self, client: kube::Client) -> Api<Topic> {
        match self {
            Self::All => Api::all(client),
            Self::One(namespace) => Api::namespaced(client, namespace),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("", WatchNamespace::All)]
    #[case("  ", WatchNamespace::All)]
    #[case("messaging", WatchNamespace::One("messaging".to_owned()))]
    fn parses_watch_namespace(#[case] input: &str, #[case] expected: WatchNamespace) {
        assert_eq!(WatchNamespace::from(input), expected);
    }

    #[test]
    fn displays_selection() {
        assert_eq!(WatchNamespace::All.to_string(), "<all>");
        assert_eq!(WatchNamespace::from("messaging").to_string(), "messaging");
    }
}

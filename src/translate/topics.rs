//! Topic layout helpers

use serde::{Deserialize, Serialize};

/// Command names the bridge subscribes to, below `subscribe_prefix`
pub const COMMANDS: [&str; 3] = ["send", "setreceive", "ping"];

/// The two topic prefixes the bridge reads from and writes to
///
/// Every topic is `prefix + name`. No separator is inserted, so a prefix
/// normally ends with `/`.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct TopicNamespace {
    pub subscribe_prefix: String,
    pub publish_prefix: String,
}

impl Default for TopicNamespace {
    fn default() -> Self {
        Self {
            subscribe_prefix: "rfbridge/command/".to_string(),
            publish_prefix: "rfbridge/event/".to_string(),
        }
    }
}

impl TopicNamespace {
    pub fn new(subscribe_prefix: impl Into<String>, publish_prefix: impl Into<String>) -> Self {
        Self {
            subscribe_prefix: subscribe_prefix.into(),
            publish_prefix: publish_prefix.into(),
        }
    }

    /// Full topics for every command the device understands
    pub fn subscriptions(&self) -> Vec<String> {
        COMMANDS
            .iter()
            .map(|command| format!("{}{}", self.subscribe_prefix, command))
            .collect()
    }

    /// Command suffix of `topic`, or `None` when it lies outside the namespace
    pub fn command_name<'a>(&self, topic: &'a str) -> Option<&'a str> {
        topic.strip_prefix(self.subscribe_prefix.as_str())
    }

    pub fn event_topic(&self, token: &str) -> String {
        format!("{}{}", self.publish_prefix, token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn namespace() -> TopicNamespace {
        TopicNamespace::new("home/rf/in/", "home/rf/out/")
    }

    #[test]
    fn subscribes_to_every_command() {
        assert_eq!(
            namespace().subscriptions(),
            vec![
                "home/rf/in/send".to_string(),
                "home/rf/in/setreceive".to_string(),
                "home/rf/in/ping".to_string(),
            ]
        );
    }

    #[test]
    fn command_name_requires_the_prefix() {
        let ns = namespace();
        assert_eq!(ns.command_name("home/rf/in/send"), Some("send"));
        assert_eq!(ns.command_name("home/rf/in/"), Some(""));
        assert_eq!(ns.command_name("home/rf/out/send"), None);
        assert_eq!(ns.command_name("xhome/rf/in/send"), None);
    }

    #[test]
    fn event_topic_appends_token() {
        assert_eq!(namespace().event_topic("receive"), "home/rf/out/receive");
    }
}

use crate::outputs::Pin;

const STATUS_SEGMENT: &str = "status";

/// Topic layout derived from the command filter
///
/// For the filter `home/light/+` commands arrive on `home/light/13` and the
/// retained status goes to `home/light/13/status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicScheme {
    filter: String,
    base: String,
}

impl TopicScheme {
    pub fn from_filter(filter: &str) -> Self {
        let base = filter.strip_suffix("/+").unwrap_or(filter);
        Self {
            filter: filter.to_string(),
            base: base.to_string(),
        }
    }

    pub fn command_filter(&self) -> &str {
        &self.filter
    }

    pub fn status_topic(&self, pin: Pin) -> String {
        format!("{}/{}/{}", self.base, pin, STATUS_SEGMENT)
    }

    /// True for topics carrying our own status reports
    pub fn is_status_echo(topic: &str) -> bool {
        topic.split('/').any(|segment| segment == STATUS_SEGMENT)
    }

    /// Reads the pin number from the last topic segment
    pub fn pin_from_topic(topic: &str) -> Option<Pin> {
        topic.rsplit('/').next()?.parse().ok().map(Pin)
    }
}

use rand::{Rng, distr::Alphanumeric};
use thiserror::Error;
use time::Duration;

pub const FILE_NAME_SUFFIX_LEN: usize = 7;

/// A lifetime that is strictly greater than zero.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Default, Hash)]
pub struct PositiveDuration(Duration);

impl PositiveDuration {
    #[must_use]
    pub fn new(duration: Duration) -> Option<Self> {
        duration.is_positive().then_some(Self(duration))
    }

    pub fn from_seconds(seconds: i64) -> Result<Self, NonPositiveDurationError> {
        Duration::seconds(seconds).try_into()
    }

    #[must_use]
    pub fn get(&self) -> Duration {
        self.0
    }

    #[must_use]
    pub fn whole_seconds(&self) -> i64 {
        self.0.whole_seconds()
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The duration is not positive: {0}")]
pub struct NonPositiveDurationError(Duration);

impl TryFrom<Duration> for PositiveDuration {
    type Error = NonPositiveDurationError;

    fn try_from(value: Duration) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(NonPositiveDurationError(value))
    }
}

/// Reduces an uploaded file name to its last path component and the characters
/// `[-A-Za-z0-9_.]`, turning spaces into underscores.
#[must_use]
pub fn sanitize_file_name(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();
    let sanitized: String = base
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('_'),
            c if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') => Some(c),
            _ => None,
        })
        .collect();

    (!sanitized.is_empty() && sanitized.chars().any(|c| c != '.')).then_some(sanitized)
}

/// `small.gif` becomes `small_Ab3dE9x.gif`.
#[must_use]
pub fn with_random_suffix(file_name: &str) -> String {
    let suffix: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(FILE_NAME_SUFFIX_LEN)
        .map(char::from)
        .collect();

    match file_name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => format!("{stem}_{suffix}.{extension}"),
        _ => format!("{file_name}_{suffix}"),
    }
}

#[cfg(test)]
mod tests {
    use crate::util::{FILE_NAME_SUFFIX_LEN, PositiveDuration, sanitize_file_name, with_random_suffix};
    use time::Duration;

    #[test]
    fn positive_duration() {
        assert!(PositiveDuration::new(Duration::seconds(1)).is_some());
        assert!(PositiveDuration::new(Duration::ZERO).is_none());
        assert!(PositiveDuration::from_seconds(-5).is_err());
        assert_eq!(PositiveDuration::from_seconds(90).unwrap().whole_seconds(), 90);
    }

    #[test]
    fn file_names() {
        assert_eq!(sanitize_file_name("small.gif").as_deref(), Some("small.gif"));
        assert_eq!(
            sanitize_file_name("../../etc/my photo (1).png").as_deref(),
            Some("my_photo_1.png")
        );
        assert_eq!(
            sanitize_file_name("C:\\Users\\me\\cat.jpg").as_deref(),
            Some("cat.jpg")
        );
        assert_eq!(sanitize_file_name(".."), None);
        assert_eq!(sanitize_file_name("картинка"), None);
    }

    #[test]
    fn random_suffix() {
        let renamed = with_random_suffix("small.gif");
        assert!(renamed.starts_with("small_"));
        assert!(renamed.ends_with(".gif"));
        assert_eq!(renamed.len(), "small_.gif".len() + FILE_NAME_SUFFIX_LEN);

        assert_ne!(with_random_suffix("small.gif"), with_random_suffix("small.gif"));
    }
}

//! Resolution of configured keys to rendered values.

use crate::record::Record;
use crate::timefmt::TimeFormatter;
use std::borrow::Cow;

/// Maps a configured key to its value for one record.
///
/// The time key renders the record timestamp, the tag key renders the batch
/// tag, and any other key is looked up in the record fields (missing keys
/// render empty).
#[derive(Debug, Clone)]
pub struct FieldResolver {
    time_key: Option<String>,
    tag_key: String,
    time: TimeFormatter,
}

impl FieldResolver {
    pub fn new(time_key: Option<String>, tag_key: String, time: TimeFormatter) -> Self {
        Self {
            time_key,
            tag_key,
            time,
        }
    }

    pub fn is_time_key(&self, key: &str) -> bool {
        self.time_key.as_deref() == Some(key)
    }

    pub fn is_tag_key(&self, key: &str) -> bool {
        self.tag_key == key
    }

    pub fn time_formatter(&self) -> &TimeFormatter {
        &self.time
    }

    /// Resolve `key` against `record` under `tag`.
    pub fn resolve<'a>(&self, key: &str, record: &'a Record, tag: &'a str) -> Cow<'a, [u8]> {
        if self.is_time_key(key) {
            Cow::Owned(self.time.format(record.timestamp).into_bytes())
        } else if self.is_tag_key(key) {
            Cow::Borrowed(tag.as_bytes())
        } else {
            match record.get(key) {
                Some(value) => value.render(),
                None => Cow::Borrowed(b""),
            }
        }
    }

    /// Resolve every key in order.
    pub fn resolve_all<'a>(
        &self,
        keys: &[String],
        record: &'a Record,
        tag: &'a str,
    ) -> Vec<Cow<'a, [u8]>> {
        keys.iter()
            .map(|key| self.resolve(key, record, tag))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: i64 = 1_700_000_000;

    fn resolver() -> FieldResolver {
        FieldResolver::new(
            Some("time".to_string()),
            "tag".to_string(),
            TimeFormatter::new(Some("%Y/%m/%d %H:%M:%S".to_string()), false, None),
        )
    }

    #[test]
    fn time_key_renders_formatted_timestamp() {
        let record = Record::new(T).with_field("time", "ignored");
        let r = resolver();
        assert_eq!(r.resolve("time", &record, "test").as_ref(), b"2023/11/14 22:13:20");
    }

    #[test]
    fn tag_key_renders_tag() {
        let record = Record::new(T).with_field("tag", "ignored");
        assert_eq!(resolver().resolve("tag", &record, "app.error").as_ref(), b"app.error");
    }

    #[test]
    fn other_keys_render_record_values() {
        let record = Record::new(T)
            .with_field("value", "hello")
            .with_field("count", 7_i64)
            .with_field("ok", false);
        let r = resolver();
        assert_eq!(r.resolve("value", &record, "t").as_ref(), b"hello");
        assert_eq!(r.resolve("count", &record, "t").as_ref(), b"7");
        assert_eq!(r.resolve("ok", &record, "t").as_ref(), b"false");
    }

    #[test]
    fn missing_key_renders_empty() {
        let record = Record::new(T);
        assert!(resolver().resolve("absent", &record, "t").is_empty());
    }

    #[test]
    fn without_time_key_time_is_a_record_field() {
        let r = FieldResolver::new(
            None,
            "tag".to_string(),
            TimeFormatter::new(None, false, None),
        );
        let record = Record::new(T).with_field("time", "from-record");
        assert_eq!(r.resolve("time", &record, "t").as_ref(), b"from-record");
        assert!(!r.is_time_key("time"));
    }

    #[test]
    fn resolve_all_keeps_key_order() {
        let record = Record::new(T).with_field("value", "v");
        let values = resolver().resolve_all(
            &["value".to_string(), "tag".to_string(), "time".to_string()],
            &record,
            "t",
        );
        let values: Vec<&[u8]> = values.iter().map(|v| v.as_ref()).collect();
        assert_eq!(values, vec![&b"v"[..], &b"t"[..], &b"2023/11/14 22:13:20"[..]]);
    }
}

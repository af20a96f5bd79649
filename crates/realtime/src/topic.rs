// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2025 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Topic naming for the realtime channel.
//!
//! Topics are strings in the format `{event_type}:{key}`, for example
//! `Exchange:device.123.temp`. Passthrough event types without a key use the bare
//! type name as the topic (e.g. `Notice`).
//!
//! The transport treats topics as opaque; only the announcement and emit paths group
//! them by their event-type prefix.

use indexmap::IndexMap;

/// Separator between the event type and the entity key.
pub const TOPIC_DELIMITER: char = ':';

/// Bucket used by [`group_topics`] for topics without an event-type prefix.
pub const UNTYPED: &str = "";

/// Encodes an event type and entity key into a topic string.
#[must_use]
pub fn encode_topic(event_type: &str, key: &str) -> String {
    format!("{event_type}{TOPIC_DELIMITER}{key}")
}

/// Splits a topic into its optional event type and key.
///
/// The split happens on the first delimiter, so keys may themselves contain `:`.
/// A topic without a delimiter yields `(None, topic)`.
#[must_use]
pub fn split_topic(topic: &str) -> (Option<&str>, &str) {
    topic
        .split_once(TOPIC_DELIMITER)
        .map_or((None, topic), |(event_type, key)| (Some(event_type), key))
}

/// Groups topics by event type, collecting their keys in first-seen order.
///
/// Topics without an event-type prefix are grouped under [`UNTYPED`] with the
/// whole topic as their key. Duplicate keys within a group are kept once.
pub fn group_topics<'a, I>(topics: I) -> IndexMap<String, Vec<String>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut groups: IndexMap<String, Vec<String>> = IndexMap::new();

    for topic in topics {
        let (event_type, key) = split_topic(topic);
        let keys = groups
            .entry(event_type.unwrap_or(UNTYPED).to_string())
            .or_default();

        if !keys.iter().any(|existing| existing == key) {
            keys.push(key.to_string());
        }
    }

    groups
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("Exchange", "device.123.temp", "Exchange:device.123.temp")]
    #[case("Alarm", "gateway-7", "Alarm:gateway-7")]
    #[case("Exchange", "", "Exchange:")]
    fn test_encode_topic(#[case] event_type: &str, #[case] key: &str, #[case] expected: &str) {
        assert_eq!(encode_topic(event_type, key), expected);
    }

    #[rstest]
    fn test_split_topic_with_key() {
        assert_eq!(
            split_topic("Exchange:device.123.temp"),
            (Some("Exchange"), "device.123.temp")
        );
    }

    #[rstest]
    fn test_split_topic_key_containing_delimiter() {
        assert_eq!(
            split_topic("Exchange:urn:device:9"),
            (Some("Exchange"), "urn:device:9")
        );
    }

    #[rstest]
    fn test_split_topic_without_delimiter() {
        assert_eq!(split_topic("Notice"), (None, "Notice"));
        assert_eq!(split_topic(""), (None, ""));
    }

    #[rstest]
    fn test_group_topics_by_event_type() {
        let groups = group_topics([
            "Exchange:device.1.temp",
            "Alarm:gateway-7",
            "Exchange:device.2.temp",
        ]);

        assert_eq!(groups.len(), 2);
        assert_eq!(
            groups["Exchange"],
            vec!["device.1.temp".to_string(), "device.2.temp".to_string()]
        );
        assert_eq!(groups["Alarm"], vec!["gateway-7".to_string()]);
    }

    #[rstest]
    fn test_group_topics_deduplicates_keys() {
        let groups = group_topics(["Exchange:a", "Exchange:b", "Exchange:a"]);
        assert_eq!(groups["Exchange"], vec!["a".to_string(), "b".to_string()]);
    }

    #[rstest]
    fn test_group_topics_malformed_goes_to_untyped_bucket() {
        let groups = group_topics(["Notice", "Exchange:a", "broken"]);

        assert_eq!(
            groups[UNTYPED],
            vec!["Notice".to_string(), "broken".to_string()]
        );
        assert_eq!(groups["Exchange"], vec!["a".to_string()]);
    }

    #[rstest]
    fn test_group_topics_empty() {
        let groups = group_topics(std::iter::empty());
        assert!(groups.is_empty());
    }
}

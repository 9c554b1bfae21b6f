//! Resolution of the stream types a streamer activates.

use log::debug;
use stream_types::DeviceProfile;

use crate::config::SubscriptionPolicy;
use crate::error::{StreamerError, StreamerResult};

/// Computes subscription sets against a device profile.
pub struct SubscriptionResolver;

impl SubscriptionResolver {
    /// The profile's declared default list, verbatim.
    pub fn defaults_declared(profile: &DeviceProfile) -> Vec<String> {
        profile.default_subscriptions.clone()
    }

    /// Every stream with `nominal_srate > 0`, in profile order.
    pub fn defaults_by_rate(profile: &DeviceProfile) -> Vec<String> {
        profile
            .streams
            .iter()
            .filter(|s| s.nominal_srate > 0.0)
            .map(|s| s.name.clone())
            .collect()
    }

    pub fn defaults(profile: &DeviceProfile, policy: SubscriptionPolicy) -> Vec<String> {
        match policy {
            SubscriptionPolicy::DeviceDefaults => Self::defaults_declared(profile),
            SubscriptionPolicy::PositiveRate => Self::defaults_by_rate(profile),
        }
    }

    /// Use `explicit` when given (order kept, repeats dropped), else the
    /// defaults for `policy`.
    pub fn resolve(
        profile: &DeviceProfile,
        explicit: Option<&[String]>,
        policy: SubscriptionPolicy,
    ) -> StreamerResult<Vec<String>> {
        let Some(requested) = explicit else {
            return Ok(Self::defaults(profile, policy));
        };

        let mut resolved: Vec<String> = Vec::with_capacity(requested.len());
        for name in requested {
            if profile.stream(name).is_none() {
                return Err(StreamerError::UnknownStream(name.clone()));
            }
            if !profile.is_default_subscribed(name) {
                debug!("{} requested outside {}'s default subscriptions", name, profile.name);
            }
            if !resolved.contains(name) {
                resolved.push(name.clone());
            }
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devices::muse2016;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_declared_and_rate_defaults_differ_for_muse() {
        let profile = muse2016::profile();
        assert_eq!(
            SubscriptionResolver::defaults_declared(&profile),
            names(&["EEG", "ACC", "GYRO", "TELEMETRY", "STATUS"])
        );
        assert_eq!(
            SubscriptionResolver::defaults_by_rate(&profile),
            names(&["EEG", "ACC", "GYRO", "TELEMETRY"])
        );
    }

    #[test]
    fn test_explicit_list_used_verbatim() {
        let profile = muse2016::profile();
        let explicit = names(&["GYRO", "EEG", "GYRO"]);
        let resolved = SubscriptionResolver::resolve(
            &profile,
            Some(&explicit),
            SubscriptionPolicy::PositiveRate,
        )
        .unwrap();
        assert_eq!(resolved, names(&["GYRO", "EEG"]));
    }

    #[test]
    fn test_unknown_stream_rejected() {
        let profile = muse2016::profile();
        let explicit = names(&["EEG", "PPG"]);
        let err = SubscriptionResolver::resolve(
            &profile,
            Some(&explicit),
            SubscriptionPolicy::DeviceDefaults,
        )
        .unwrap_err();
        assert!(matches!(err, StreamerError::UnknownStream(name) if name == "PPG"));
    }

    #[test]
    fn test_policy_selects_default_set() {
        let profile = muse2016::profile();
        let resolved =
            SubscriptionResolver::resolve(&profile, None, SubscriptionPolicy::PositiveRate).unwrap();
        assert!(!resolved.contains(&"STATUS".to_string()));
        let resolved =
            SubscriptionResolver::resolve(&profile, None, SubscriptionPolicy::DeviceDefaults).unwrap();
        assert!(resolved.contains(&"STATUS".to_string()));
    }
}

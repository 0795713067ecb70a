use crate::error::{ReviewError, Result};
use crate::review::record::{ReviewableRecord, UrgencyTier};
use chrono::{DateTime, Utc};

pub const DEFAULT_ESCALATION_THRESHOLD_DAYS: i64 = 7;

const SECONDS_PER_DAY: i64 = 86_400;

/// Whole days left before `expiration`, partial days dropped
///
/// Negative once the expiration has passed.
pub fn days_remaining(expiration: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (expiration - now).num_seconds().div_euclid(SECONDS_PER_DAY)
}

/// Tier assignment with a configurable escalation threshold
#[derive(Debug, Clone, Copy)]
pub struct UrgencyClassifier {
    escalation_threshold_days: i64,
}

impl Default for UrgencyClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_ESCALATION_THRESHOLD_DAYS)
    }
}

impl UrgencyClassifier {
    /// Records with `days_remaining <= escalation_threshold_days` escalate
    pub fn new(escalation_threshold_days: i64) -> Self {
        Self {
            escalation_threshold_days,
        }
    }

    pub fn threshold(&self) -> i64 {
        self.escalation_threshold_days
    }

    pub fn tier_for_days(&self, days: i64) -> UrgencyTier {
        if days <= self.escalation_threshold_days {
            UrgencyTier::Escalation
        } else {
            UrgencyTier::Standard
        }
    }

    /// Classify a record; an already expired record is an error, never a notification
    pub fn classify(&self, record: &ReviewableRecord, now: DateTime<Utc>) -> Result<UrgencyTier> {
        let days = days_remaining(record.expiration, now);
        if days < 0 {
            return Err(ReviewError::AlreadyExpired {
                subject_id: record.subject_id.clone(),
                days_ago: -days,
            });
        }
        Ok(self.tier_for_days(days))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::record::AssignmentKind;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 0).unwrap()
    }

    fn expiring_in(offset: Duration) -> ReviewableRecord {
        ReviewableRecord {
            subject_id: "u1".into(),
            subject_display_name: "Adele Vance".into(),
            subject_email: "adele@contoso.com".into(),
            access_description: "Exchange Administrator".into(),
            assignment_kind: AssignmentKind::Eligible,
            expiration: now() + offset,
            reviewer_email: "iam@contoso.com".into(),
            manager_email: None,
        }
    }

    #[test]
    fn test_days_remaining_truncates_partial_days() {
        assert_eq!(days_remaining(now() + Duration::hours(23), now()), 0);
        assert_eq!(days_remaining(now() + Duration::hours(47), now()), 1);
        assert_eq!(days_remaining(now() + Duration::days(7), now()), 7);
        assert_eq!(days_remaining(now() - Duration::hours(1), now()), -1);
    }

    #[test]
    fn test_seven_days_escalates_eight_does_not() {
        let classifier = UrgencyClassifier::default();
        assert_eq!(
            classifier.classify(&expiring_in(Duration::days(7)), now()).unwrap(),
            UrgencyTier::Escalation
        );
        assert_eq!(
            classifier
                .classify(&expiring_in(Duration::days(7) + Duration::hours(23)), now())
                .unwrap(),
            UrgencyTier::Escalation
        );
        assert_eq!(
            classifier.classify(&expiring_in(Duration::days(8)), now()).unwrap(),
            UrgencyTier::Standard
        );
        assert_eq!(
            classifier.classify(&expiring_in(Duration::days(30)), now()).unwrap(),
            UrgencyTier::Standard
        );
    }

    #[test]
    fn test_expiring_today_escalates() {
        let classifier = UrgencyClassifier::default();
        assert_eq!(
            classifier.classify(&expiring_in(Duration::zero()), now()).unwrap(),
            UrgencyTier::Escalation
        );
    }

    #[test]
    fn test_expired_record_is_error() {
        let classifier = UrgencyClassifier::default();
        let err = classifier
            .classify(&expiring_in(-Duration::days(2)), now())
            .unwrap_err();
        assert!(matches!(err, ReviewError::AlreadyExpired { days_ago: 2, .. }));
    }

    #[test]
    fn test_threshold_is_configurable() {
        let classifier = UrgencyClassifier::new(3);
        assert_eq!(classifier.tier_for_days(3), UrgencyTier::Escalation);
        assert_eq!(classifier.tier_for_days(4), UrgencyTier::Standard);
        assert_eq!(classifier.threshold(), 3);
    }
}

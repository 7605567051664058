//! Qualification decision logic.
//!
//! `classify` walks the tiers in precedence order and stops at the first
//! match. It reads only its arguments, so identical inputs always produce an
//! identical result.

use crate::config::RunContext;
use crate::types::{
    DuplicateStatus, FetchStatus, ProfileEmptiness, ProfileSnapshot, QualificationResult,
    QualificationStatus, RegistrationRecord,
};

/// Trimmed, lowercased email for comparisons
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Whether `email` belongs to the canonical domain.
///
/// A domain containing `@` is treated as a required email suffix
/// (`.chapter@gmail.com`); otherwise the part after `@` must equal the domain
/// or be a subdomain of it.
pub fn carries_domain(email: &str, canonical_domain: &str) -> bool {
    let email = normalize_email(email);
    let domain = canonical_domain.trim().to_lowercase();
    if email.is_empty() || domain.is_empty() {
        return false;
    }
    if domain.contains('@') {
        return email.ends_with(&domain);
    }
    match email.rsplit_once('@') {
        Some((_, host)) => host == domain || host.ends_with(&format!(".{}", domain)),
        None => false,
    }
}

/// Profile-derived identity mentions the canonical domain
fn identity_carries_domain(identity: Option<&str>, canonical_domain: &str) -> bool {
    let Some(identity) = identity else {
        return false;
    };
    if identity.contains('@') && carries_domain(identity, canonical_domain) {
        return true;
    }
    let domain = canonical_domain.trim().trim_start_matches('@').to_lowercase();
    !domain.is_empty() && identity.to_lowercase().contains(&domain)
}

fn result(status: QualificationStatus, reason: impl Into<String>, dup: &DuplicateStatus) -> QualificationResult {
    QualificationResult {
        status,
        reason: reason.into(),
        is_duplicate: dup.is_duplicate(),
        duplicate_group_id: dup.group_id,
    }
}

/// Result for a row that failed the required-field check
pub fn incomplete_registration(missing: &[&str]) -> QualificationResult {
    let reason = if missing.is_empty() {
        "Missing required fields".to_string()
    } else {
        format!("Missing required fields: {}", missing.join(", "))
    };
    result(
        QualificationStatus::IncompleteRegistration,
        reason,
        &DuplicateStatus::unique(None),
    )
}

fn activity_summary(snapshot: &ProfileSnapshot) -> String {
    let mut parts = Vec::new();
    if snapshot.badge_count > 0 {
        parts.push(format!("Has {} badges", snapshot.badge_count));
    }
    if let Some(points) = snapshot.points.filter(|p| *p > 0) {
        parts.push(format!("{} points", points));
    }
    if !snapshot.league.trim().is_empty() {
        parts.push(format!("league {}", snapshot.league.trim()));
    }
    parts.join(", ")
}

/// Classify one loaded record.
///
/// `snapshot` is `None` when no enrichment ran for the record (terms
/// declined, secondary duplicate). Reaching the profile rules without one
/// sends the record to review.
pub fn classify(
    ctx: &RunContext,
    record: &RegistrationRecord,
    duplicate: &DuplicateStatus,
    snapshot: Option<&ProfileSnapshot>,
) -> QualificationResult {
    use QualificationStatus::*;

    if !record.terms_accepted {
        return result(TermsDeclined, "Terms not accepted", duplicate);
    }
    if duplicate.is_secondary() {
        let group = duplicate
            .group_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "?".to_string());
        return result(
            DuplicateEntry,
            format!(
                "Duplicate phone number (group {}, entry {})",
                group, duplicate.position
            ),
            duplicate,
        );
    }
    if record.profile_url.is_none() {
        return result(NoProfileUrl, "No Skills Boost profile URL provided", duplicate);
    }
    let Some(snapshot) = snapshot else {
        return result(ReviewNeeded, "Profile was not enriched", duplicate);
    };
    if snapshot.fetch_status == FetchStatus::SkippedNoUrl {
        return result(NoProfileUrl, "No Skills Boost profile URL provided", duplicate);
    }

    let emptiness = snapshot.emptiness();
    if emptiness == ProfileEmptiness::Active {
        return result(Disqualified, activity_summary(snapshot), duplicate);
    }

    let domain = ctx.canonical_domain.as_str();
    let target_year = ctx.target_year;
    let email = normalize_email(&record.email);
    let sb_email = normalize_email(&record.skillsboost_email);
    // A different Skills Boost email outside the domain is a separate personal account
    let personal_account =
        !sb_email.is_empty() && sb_email != email && !carries_domain(&sb_email, domain);
    let fresh_account = snapshot.creation_year == Some(target_year);
    let empty = emptiness == ProfileEmptiness::Empty;

    if empty && fresh_account && !personal_account && carries_domain(&email, domain) {
        return result(
            HardQualified,
            format!(
                "{} domain email, {} account, no prior activity",
                domain.trim_start_matches('@'),
                target_year
            ),
            duplicate,
        );
    }
    if empty && fresh_account && !sb_email.is_empty() && sb_email == email {
        return result(
            QualifiedTier2,
            format!("Matching Skills Boost email, {} account, no prior activity", target_year),
            duplicate,
        );
    }
    if !sb_email.is_empty() && sb_email != email {
        if carries_domain(&sb_email, domain) {
            return result(
                FlaggedDiffAccount,
                format!("Skills Boost email differs from registration email and uses {}", domain),
                duplicate,
            );
        }
        if identity_carries_domain(snapshot.identity.as_deref(), domain) {
            return result(
                FlaggedDiffAccount,
                format!("Skills Boost email differs from registration email; profile identity shows {}", domain),
                duplicate,
            );
        }
    }
    if empty {
        if let Some(year) = snapshot.creation_year.filter(|y| *y < target_year) {
            return result(
                CautionPre2025,
                format!("Created in {} but empty profile", year),
                duplicate,
            );
        }
    }

    result(ReviewNeeded, review_reason(snapshot, target_year), duplicate)
}

fn review_reason(snapshot: &ProfileSnapshot, target_year: i32) -> String {
    match snapshot.fetch_status {
        FetchStatus::FetchFailed => format!("Profile fetch failed after {} attempts", snapshot.attempts),
        FetchStatus::NotFound => "Profile page not found".to_string(),
        _ => match snapshot.creation_year {
            None => "Account creation year could not be determined".to_string(),
            Some(year) if year > target_year => {
                format!("Account created in {}, after {}", year, target_year)
            }
            Some(_) => format!(
                "{} account with no activity, but emails do not qualify",
                target_year
            ),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DuplicateRole;

    fn ctx() -> RunContext {
        RunContext::new("gdg.org", 2025)
    }

    fn record(email: &str, sb_email: &str) -> RegistrationRecord {
        RegistrationRecord {
            row_number: 1,
            name: "Ada".into(),
            email: email.into(),
            skillsboost_email: sb_email.into(),
            phone: "555-0100".into(),
            profile_url: Some("https://www.cloudskillsboost.google/public_profiles/ada".into()),
            terms_accepted: true,
        }
    }

    fn empty_profile(year: i32) -> ProfileSnapshot {
        ProfileSnapshot {
            creation_year: Some(year),
            points: Some(0),
            attempts: 1,
            ..ProfileSnapshot::without_profile(FetchStatus::Ok)
        }
    }

    fn unique() -> DuplicateStatus {
        DuplicateStatus::unique(Some(1))
    }

    #[test]
    fn test_domain_account_created_in_target_year_is_hard_qualified() {
        let out = classify(
            &ctx(),
            &record("a@gdg.org", "a@gdg.org"),
            &unique(),
            Some(&empty_profile(2025)),
        );
        assert_eq!(out.status, QualificationStatus::HardQualified);
        assert_eq!(out.reason, "gdg.org domain email, 2025 account, no prior activity");
        assert!(!out.is_duplicate);
        assert_eq!(out.duplicate_group_id, Some(1));
    }

    #[test]
    fn test_second_domain_skills_boost_email_still_hard_qualifies() {
        let out = classify(
            &ctx(),
            &record("a@gdg.org", "a.other@gdg.org"),
            &unique(),
            Some(&empty_profile(2025)),
        );
        assert_eq!(out.status, QualificationStatus::HardQualified);
    }

    #[test]
    fn test_personal_skills_boost_account_with_domain_identity_is_flagged() {
        let mut snapshot = empty_profile(2025);
        snapshot.identity = Some("ada@gdg.org".into());
        let out = classify(
            &ctx(),
            &record("a@gdg.org", "a@personal.com"),
            &unique(),
            Some(&snapshot),
        );
        assert_eq!(out.status, QualificationStatus::FlaggedDiffAccount);
        assert!(out.reason.contains("profile identity"));
    }

    #[test]
    fn test_badges_disqualify_before_anything_else() {
        let mut snapshot = empty_profile(2025);
        snapshot.badge_count = 5;
        let out = classify(
            &ctx(),
            &record("a@gdg.org", "a@gdg.org"),
            &unique(),
            Some(&snapshot),
        );
        assert_eq!(out.status, QualificationStatus::Disqualified);
        assert_eq!(out.reason, "Has 5 badges");
    }

    #[test]
    fn test_league_alone_counts_as_activity() {
        let mut snapshot = empty_profile(2025);
        snapshot.league = "Bronze League".into();
        snapshot.points = Some(300);
        let out = classify(&ctx(), &record("a@x.com", "a@x.com"), &unique(), Some(&snapshot));
        assert_eq!(out.status, QualificationStatus::Disqualified);
        assert_eq!(out.reason, "300 points, league Bronze League");
    }

    #[test]
    fn test_secondary_duplicate_ignores_profile() {
        let dup = DuplicateStatus {
            role: DuplicateRole::Secondary,
            group_id: Some(3),
            position: 2,
        };
        let out = classify(&ctx(), &record("a@gdg.org", "a@gdg.org"), &dup, None);
        assert_eq!(out.status, QualificationStatus::DuplicateEntry);
        assert!(out.is_duplicate);
        assert_eq!(out.duplicate_group_id, Some(3));
    }

    #[test]
    fn test_primary_duplicate_classified_normally() {
        let dup = DuplicateStatus {
            role: DuplicateRole::Primary,
            group_id: Some(3),
            position: 1,
        };
        let out = classify(
            &ctx(),
            &record("a@gdg.org", "a@gdg.org"),
            &dup,
            Some(&empty_profile(2025)),
        );
        assert_eq!(out.status, QualificationStatus::HardQualified);
        assert!(out.is_duplicate);
    }

    #[test]
    fn test_blank_url_is_no_profile_url() {
        let mut rec = record("a@gdg.org", "a@gdg.org");
        rec.profile_url = None;
        let out = classify(&ctx(), &rec, &unique(), Some(&ProfileSnapshot::skipped_no_url()));
        assert_eq!(out.status, QualificationStatus::NoProfileUrl);
    }

    #[test]
    fn test_fetch_failure_goes_to_review() {
        let snapshot = ProfileSnapshot {
            attempts: 3,
            ..ProfileSnapshot::without_profile(FetchStatus::FetchFailed)
        };
        let out = classify(&ctx(), &record("a@gdg.org", "a@gdg.org"), &unique(), Some(&snapshot));
        assert_eq!(out.status, QualificationStatus::ReviewNeeded);
        assert_eq!(out.reason, "Profile fetch failed after 3 attempts");
    }

    #[test]
    fn test_matching_personal_emails_are_tier2() {
        let out = classify(
            &ctx(),
            &record("Ada@Example.com ", "ada@example.com"),
            &unique(),
            Some(&empty_profile(2025)),
        );
        assert_eq!(out.status, QualificationStatus::QualifiedTier2);
    }

    #[test]
    fn test_old_empty_account_is_caution() {
        let out = classify(
            &ctx(),
            &record("a@example.com", "a@example.com"),
            &unique(),
            Some(&empty_profile(2023)),
        );
        assert_eq!(out.status, QualificationStatus::CautionPre2025);
        assert_eq!(out.reason, "Created in 2023 but empty profile");
    }

    #[test]
    fn test_different_domain_skills_boost_email_is_flagged() {
        let out = classify(
            &ctx(),
            &record("a@example.com", "ada@gdg.org"),
            &unique(),
            Some(&empty_profile(2023)),
        );
        assert_eq!(out.status, QualificationStatus::FlaggedDiffAccount);
    }

    #[test]
    fn test_terms_declined_wins_over_duplicate() {
        let mut rec = record("a@gdg.org", "a@gdg.org");
        rec.terms_accepted = false;
        let dup = DuplicateStatus {
            role: DuplicateRole::Secondary,
            group_id: Some(1),
            position: 2,
        };
        let out = classify(&ctx(), &rec, &dup, None);
        assert_eq!(out.status, QualificationStatus::TermsDeclined);
    }

    #[test]
    fn test_unknown_creation_year_goes_to_review() {
        let snapshot = ProfileSnapshot {
            creation_year: None,
            ..empty_profile(2025)
        };
        let out = classify(&ctx(), &record("a@gdg.org", "a@gdg.org"), &unique(), Some(&snapshot));
        assert_eq!(out.status, QualificationStatus::ReviewNeeded);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let rec = record("a@gdg.org", "a@gdg.org");
        let snapshot = empty_profile(2025);
        let first = classify(&ctx(), &rec, &unique(), Some(&snapshot));
        let second = classify(&ctx(), &rec, &unique(), Some(&snapshot));
        assert_eq!(first, second);
    }

    #[test]
    fn test_incomplete_registration_names_fields() {
        let out = incomplete_registration(&["Name", "Phone Number"]);
        assert_eq!(out.status, QualificationStatus::IncompleteRegistration);
        assert_eq!(out.reason, "Missing required fields: Name, Phone Number");
    }

    #[test]
    fn test_carries_domain_variants() {
        assert!(carries_domain("A@GDG.org", "gdg.org"));
        assert!(carries_domain("a@mail.gdg.org", "gdg.org"));
        assert!(!carries_domain("a@notgdg.org", "gdg.org"));
        assert!(!carries_domain("gdg.org", "gdg.org"));
        assert!(carries_domain("ada.chapter@gmail.com", ".chapter@gmail.com"));
        assert!(!carries_domain("ada@gmail.com", ".chapter@gmail.com"));
    }
}

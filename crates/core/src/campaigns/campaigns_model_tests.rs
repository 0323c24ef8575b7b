//! Tests for campaign domain models.

#[cfg(test)]
mod tests {
    use crate::campaigns::{
        progress_percent, Campaign, CampaignCategory, CampaignFilter, CampaignStatus, NewCampaign,
    };
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn campaign(
        goal: rust_decimal::Decimal,
        raised: rust_decimal::Decimal,
        deadline: NaiveDate,
    ) -> Campaign {
        Campaign {
            id: "c1".to_string(),
            title: "Clean water".to_string(),
            description: "Wells for three villages".to_string(),
            category: CampaignCategory::Health,
            goal,
            current_amount: raised,
            deadline,
            user_id: "owner".to_string(),
            status: CampaignStatus::Active,
            image_url: None,
            created_at: None,
        }
    }

    // ==================== Derived status ====================

    #[test]
    fn test_goal_reached_is_completed() {
        let today = date(2026, 3, 10);
        let c = campaign(dec!(10000), dec!(10000), date(2026, 12, 31));
        assert_eq!(c.derived_status(today), CampaignStatus::Completed);
    }

    #[test]
    fn test_past_deadline_is_completed() {
        let today = date(2026, 3, 10);
        let c = campaign(dec!(1000), dec!(500), date(2026, 3, 9));
        assert_eq!(c.derived_status(today), CampaignStatus::Completed);
    }

    #[test]
    fn test_deadline_day_is_completed() {
        let today = date(2026, 3, 10);
        let c = campaign(dec!(1000), dec!(500), date(2026, 3, 10));
        assert_eq!(c.days_left(today), 0);
        assert_eq!(c.derived_status(today), CampaignStatus::Completed);
    }

    #[test]
    fn test_running_campaign_is_active() {
        let today = date(2026, 3, 10);
        let c = campaign(dec!(1000), dec!(500), date(2026, 3, 11));
        assert_eq!(c.days_left(today), 1);
        assert_eq!(c.derived_status(today), CampaignStatus::Active);
    }

    #[test]
    fn test_stored_completed_wins() {
        let mut c = campaign(dec!(1000), dec!(10), date(2030, 1, 1));
        c.status = CampaignStatus::Completed;
        assert_eq!(c.derived_status(date(2026, 1, 1)), CampaignStatus::Completed);
    }

    // ==================== Progress ====================

    #[test]
    fn test_progress_rounds_and_caps() {
        assert_eq!(progress_percent(dec!(0), dec!(1000)), 0);
        assert_eq!(progress_percent(dec!(125), dec!(1000)), 13);
        assert_eq!(progress_percent(dec!(124), dec!(1000)), 12);
        assert_eq!(progress_percent(dec!(2500), dec!(1000)), 100);
        assert_eq!(progress_percent(dec!(50), dec!(0)), 0);
    }

    // ==================== Wire format ====================

    #[test]
    fn test_decode_backend_row() {
        let row = json!({
            "id": "7b1c",
            "title": "School roof",
            "description": "Fix the roof before winter",
            "category": "Education",
            "goal": 5000,
            "current_amount": 1250.5,
            "deadline": "2026-11-30",
            "user_id": "u-1",
            "status": "active",
            "image_url": null,
            "created_at": "2026-01-02T10:00:00.123456+00:00"
        });
        let c: Campaign = serde_json::from_value(row).unwrap();
        assert_eq!(c.category, CampaignCategory::Education);
        assert_eq!(c.goal, dec!(5000));
        assert_eq!(c.current_amount, dec!(1250.5));
        assert_eq!(c.deadline, date(2026, 11, 30));
        assert!(c.created_at.is_some());
    }

    #[test]
    fn test_unknown_category_decodes_to_other() {
        assert_eq!(CampaignCategory::from_wire("Arts & Culture"), CampaignCategory::Other);
        assert_eq!(CampaignCategory::from_wire("Disaster Relief"), CampaignCategory::Disaster);
        let c: CampaignCategory = serde_json::from_value(json!("space travel")).unwrap();
        assert_eq!(c, CampaignCategory::Other);
        let c: CampaignCategory = serde_json::from_value(json!(null)).unwrap();
        assert_eq!(c, CampaignCategory::Other);
    }

    #[test]
    fn test_deadline_accepts_timestamp() {
        let row = json!({
            "id": "c2",
            "title": "Trees",
            "goal": 100,
            "deadline": "2026-05-01T00:00:00+00:00"
        });
        let c: Campaign = serde_json::from_value(row).unwrap();
        assert_eq!(c.deadline, date(2026, 5, 1));
        assert_eq!(c.status, CampaignStatus::Active);
        assert_eq!(c.current_amount, dec!(0));
    }

    // ==================== Filter ====================

    #[test]
    fn test_filter_matches_category_and_text() {
        let c = campaign(dec!(1000), dec!(0), date(2026, 12, 1));
        assert!(CampaignFilter::default().matches(&c));
        assert!(CampaignFilter::default().with_query("WATER").matches(&c));
        assert!(CampaignFilter::default().with_query("villages").matches(&c));
        assert!(!CampaignFilter::default().with_query("roof").matches(&c));
        assert!(!CampaignFilter::default()
            .with_category(CampaignCategory::Education)
            .matches(&c));
        assert!(CampaignFilter::default().with_query("   ").matches(&c));
    }

    // ==================== New campaign validation ====================

    fn new_campaign() -> NewCampaign {
        NewCampaign {
            title: "Clean water wells".to_string(),
            description: "Three wells for villages without safe water".to_string(),
            category: CampaignCategory::Health,
            goal: dec!(5000),
            deadline: date(2026, 6, 1),
            image_url: Some("  ".to_string()),
        }
    }

    #[test]
    fn test_new_campaign_valid() {
        let today = date(2026, 3, 10);
        assert!(new_campaign().validate(today).is_ok());

        let insert = new_campaign().into_insert("owner-1");
        assert_eq!(insert.current_amount, dec!(0));
        assert_eq!(insert.status, CampaignStatus::Active);
        assert_eq!(insert.user_id, "owner-1");
        assert_eq!(insert.image_url, None);
    }

    #[test]
    fn test_new_campaign_field_errors() {
        let today = date(2026, 3, 10);
        let invalid = NewCampaign {
            title: "Tiny".to_string(),
            description: "Too short".to_string(),
            goal: dec!(99.99),
            deadline: today,
            ..new_campaign()
        };
        let err = invalid.validate(today).unwrap_err();
        let fields: Vec<&str> = err.field_errors().iter().map(|f| f.field.as_str()).collect();
        assert_eq!(fields, vec!["title", "description", "goal", "deadline"]);
    }
}

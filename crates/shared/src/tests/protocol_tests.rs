use super::*;

#[test]
fn page_counts_pages_and_handles_empty() {
    let page: Page<u8> = Page::new(vec![1, 2], 102, 0, 50);
    assert_eq!(page.total_pages, 3);

    let empty: Page<u8> = Page::new(Vec::new(), 0, 0, 50);
    assert_eq!(empty.total_pages, 0);
}

#[test]
fn page_serializes_spring_style_envelope() {
    let page = Page::new(vec!["a"], 1, 0, 50);
    let value = serde_json::to_value(&page).expect("json");
    assert_eq!(value["totalElements"], 1);
    assert_eq!(value["totalPages"], 1);
    assert_eq!(value["number"], 0);
    assert_eq!(value["size"], 50);
}

#[test]
fn account_request_reads_type_field() {
    let req: AccountRequest = serde_json::from_str(
        r#"{"name":"Sapphire","type":"CREDIT_CARD","creditLimit":5000,"paymentDueDay":12}"#,
    )
    .expect("json");
    assert_eq!(req.account_type, Some(AccountType::CreditCard));
    assert_eq!(req.credit_limit, Some(5000.0));
    assert_eq!(req.payment_due_day, Some(12));
}

#[test]
fn detected_income_uses_profile_field_name() {
    let value = serde_json::to_value(DetectedIncome { monthly_income: 3100.0 }).expect("json");
    assert_eq!(value["monthlyIncome"], 3100.0);
    assert!(value.get("detectedMonthlyIncome").is_none());
}

#[test]
fn report_rows_use_wire_names() {
    let insight = CategoryInsight {
        category: "DINING".into(),
        monthly_average: 600.0,
        annual_cost: 7200.0,
        pct_of_income: 12.0,
        benchmark_pct: 5.0,
        status: SpendingStatus::Over,
        retirement_impact_10yr: 60_000.0,
    };
    let value = serde_json::to_value(&insight).expect("json");
    assert_eq!(value["retirementImpact10yr"], 60_000.0);
    assert_eq!(value["status"], "OVER");

    let action = ActionItem {
        rank: 1,
        title: "Automate savings transfer on payday".into(),
        description: String::new(),
        monthly_impact: 200.0,
        years_earlier: 0,
        action_type: ActionType::Saving,
    };
    let value = serde_json::to_value(&action).expect("json");
    assert_eq!(value["type"], "SAVING");
    assert_eq!(value["monthlyImpact"], 200.0);
}

use anyhow::Result;
use chrono::Utc;
use shared::domain::{FinancialProfile, PayFrequency};
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

use crate::{enum_col, id_text, uuid_col, Storage};

impl Storage {
    /// Returns the singleton profile, inserting one with default settings on first use.
    pub async fn get_or_create_profile(&self) -> Result<FinancialProfile> {
        if let Some(row) = sqlx::query("SELECT * FROM financial_profile ORDER BY created_at ASC LIMIT 1")
            .fetch_optional(&self.pool)
            .await?
        {
            return profile_from_row(&row);
        }

        let now = Utc::now();
        let profile = FinancialProfile {
            id: Uuid::new_v4(),
            monthly_income: None,
            income_source: "MANUAL".to_string(),
            pay_frequency: PayFrequency::Monthly,
            emergency_fund_target_months: 6,
            notes: None,
            age: None,
            target_retirement_age: None,
            current_investments: None,
            created_at: now,
            updated_at: now,
        };
        sqlx::query(
            "INSERT INTO financial_profile (id, income_source, pay_frequency,
                 emergency_fund_target_months, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id_text(profile.id))
        .bind(&profile.income_source)
        .bind(profile.pay_frequency.as_str())
        .bind(profile.emergency_fund_target_months)
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(profile)
    }

    pub async fn update_profile(&self, profile: &FinancialProfile) -> Result<()> {
        sqlx::query(
            "UPDATE financial_profile SET monthly_income = ?, income_source = ?, pay_frequency = ?,
                 emergency_fund_target_months = ?, notes = ?, age = ?, target_retirement_age = ?,
                 current_investments = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(profile.monthly_income)
        .bind(&profile.income_source)
        .bind(profile.pay_frequency.as_str())
        .bind(profile.emergency_fund_target_months)
        .bind(&profile.notes)
        .bind(profile.age)
        .bind(profile.target_retirement_age)
        .bind(profile.current_investments)
        .bind(Utc::now())
        .bind(id_text(profile.id))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn profile_from_row(row: &SqliteRow) -> Result<FinancialProfile> {
    Ok(FinancialProfile {
        id: uuid_col(row, "id")?,
        monthly_income: row.try_get("monthly_income")?,
        income_source: row.try_get("income_source")?,
        pay_frequency: enum_col(row, "pay_frequency")?,
        emergency_fund_target_months: row.try_get("emergency_fund_target_months")?,
        notes: row.try_get("notes")?,
        age: row.try_get("age")?,
        target_retirement_age: row.try_get("target_retirement_age")?,
        current_investments: row.try_get("current_investments")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

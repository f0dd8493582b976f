use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;

/// Subscription status of a tenant account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Trial,
    Active,
    Suspended,
    Expired,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Trial => "trial",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Suspended => "suspended",
            SubscriptionStatus::Expired => "expired",
        }
    }

    /// Lenient parse for stored values. Unknown strings fail closed.
    pub fn from_str(s: &str) -> Self {
        Self::parse(s).unwrap_or(SubscriptionStatus::Expired)
    }

    /// Strict parse for request input.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "trial" => Some(SubscriptionStatus::Trial),
            "active" => Some(SubscriptionStatus::Active),
            "suspended" => Some(SubscriptionStatus::Suspended),
            "expired" => Some(SubscriptionStatus::Expired),
            _ => None,
        }
    }

    /// Whether a tenant in this status may use tenant-scoped routes.
    pub fn allows_access(&self) -> bool {
        matches!(self, SubscriptionStatus::Trial | SubscriptionStatus::Active)
    }
}

/// A tenant account. The account's own credentials are the tenant-admin login.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub plan: String,
    pub subscription_status: SubscriptionStatus,
    pub subscription_expires_at: Option<DateTime<Utc>>,
    pub max_seats: i64,
    pub last_login_at: Option<String>,
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: i64,
    email: String,
    name: String,
    password_hash: String,
    plan: String,
    subscription_status: String,
    subscription_expires_at: Option<String>,
    max_seats: i64,
    last_login_at: Option<String>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            name: row.name,
            password_hash: row.password_hash,
            plan: row.plan,
            subscription_status: SubscriptionStatus::from_str(&row.subscription_status),
            subscription_expires_at: row
                .subscription_expires_at
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|d| d.with_timezone(&Utc)),
            max_seats: row.max_seats,
            last_login_at: row.last_login_at,
        }
    }
}

const ACCOUNT_COLUMNS: &str = "id, email, name, password_hash, plan, subscription_status, \
     subscription_expires_at, max_seats, last_login_at";

#[derive(Clone)]
pub struct AccountStore {
    pool: SqlitePool,
}

impl AccountStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new tenant account. Returns the account ID.
    pub async fn create(
        &self,
        email: &str,
        name: &str,
        password_hash: &str,
        plan: &str,
        status: SubscriptionStatus,
        expires_at: Option<&DateTime<Utc>>,
        max_seats: i64,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO accounts (email, name, password_hash, plan, subscription_status, \
             subscription_expires_at, max_seats) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(email)
        .bind(name)
        .bind(password_hash)
        .bind(plan)
        .bind(status.as_str())
        .bind(expires_at.map(|d| d.to_rfc3339()))
        .bind(max_seats)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Get an account by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Account>, sqlx::Error> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {} FROM accounts WHERE id = ?",
            ACCOUNT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Account::from))
    }

    /// Get an account by its login email.
    pub async fn get_by_email(&self, email: &str) -> Result<Option<Account>, sqlx::Error> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {} FROM accounts WHERE email = ?",
            ACCOUNT_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Account::from))
    }

    /// Overwrite the subscription fields. Admin write path only.
    pub async fn update_subscription(
        &self,
        id: i64,
        status: SubscriptionStatus,
        plan: &str,
        expires_at: Option<&DateTime<Utc>>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE accounts SET subscription_status = ?, plan = ?, subscription_expires_at = ? \
             WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(plan)
        .bind(expires_at.map(|d| d.to_rfc3339()))
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record a successful login. Callers treat failures as best-effort.
    pub async fn update_last_login(&self, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE accounts SET last_login_at = datetime('now') WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

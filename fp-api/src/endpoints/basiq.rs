//! Basiq Open Banking API (v3).

use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Method;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use fp_core::config::BankingConfig;
use fp_core::error::{FpError, FpResult};

use crate::client::HttpClient;
use crate::provider::{BankFeed, FeedAccount, FeedTransaction};
use crate::response::{BasiqAccount, BasiqList, BasiqToken, BasiqTransaction};

const API_VERSION: &str = "3.0";

/// Refresh the server token this long before Basiq expires it.
const TOKEN_SKEW: Duration = Duration::from_secs(60);

/// Hard stop on pagination in case the provider keeps returning `next`.
const MAX_PAGES: usize = 200;

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Client for one Basiq user's accounts and transactions.
#[derive(Clone)]
pub struct BasiqClient {
    http: HttpClient,
    api_key: String,
    user_id: String,
    token: Arc<Mutex<Option<CachedToken>>>,
}

impl BasiqClient {
    /// Build a client from the `[banking]` config section.
    pub fn new(config: &BankingConfig) -> FpResult<Self> {
        if !config.is_configured() {
            return Err(FpError::MissingConfig(
                "banking.api_key and banking.user_id are required".into(),
            ));
        }
        Ok(Self {
            http: HttpClient::new("basiq", &config.base_url, config.timeout_ms)?,
            api_key: config.api_key.clone(),
            user_id: config.user_id.clone(),
            token: Arc::new(Mutex::new(None)),
        })
    }

    /// Server access token, fetched on first use and reused until close
    /// to expiry.
    async fn access_token(&self) -> FpResult<String> {
        let mut guard = self.token.lock().await;
        if let Some(cached) = guard.as_ref() {
            if Instant::now() + TOKEN_SKEW < cached.expires_at {
                return Ok(cached.value.clone());
            }
        }

        debug!("requesting basiq server token");
        let builder = self
            .http
            .request(Method::POST, "/token")
            .header("Authorization", format!("Basic {}", self.api_key))
            .header("basiq-version", API_VERSION)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body("scope=SERVER_ACCESS");
        let token: BasiqToken = self.http.send_json(builder).await?;

        let value = token.access_token.clone();
        *guard = Some(CachedToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(value)
    }

    async fn get_list<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> FpResult<BasiqList<T>> {
        let token = self.access_token().await?;
        let builder = self
            .http
            .request(Method::GET, path)
            .bearer_auth(token)
            .header("basiq-version", API_VERSION)
            .header("Accept", "application/json")
            .query(query);
        self.http.send_json(builder).await
    }

    /// All accounts linked to the user.
    pub async fn list_accounts(&self) -> FpResult<Vec<BasiqAccount>> {
        let path = format!("/users/{}/accounts", self.user_id);
        let list: BasiqList<BasiqAccount> = self.get_list(&path, &[]).await?;
        Ok(list.data)
    }

    /// Transactions for the user, following `links.next` until exhausted.
    pub async fn list_transactions(&self, since: Option<NaiveDate>) -> FpResult<Vec<BasiqTransaction>> {
        let mut query = Vec::new();
        if let Some(date) = since {
            query.push((
                "filter",
                format!("transaction.postDate.gteq('{}')", date.format("%Y-%m-%d")),
            ));
        }

        let mut out = Vec::new();
        let mut path = format!("/users/{}/transactions", self.user_id);
        for page in 0..MAX_PAGES {
            // The next link already carries the filter.
            let params: &[(&str, String)] = if page == 0 { &query } else { &[] };
            let list: BasiqList<BasiqTransaction> = self.get_list(&path, params).await?;
            let next = list.next_link().map(str::to_string);
            out.extend(list.data);
            match next {
                Some(link) if link != path => path = link,
                _ => return Ok(out),
            }
        }

        warn!("basiq pagination stopped after {MAX_PAGES} pages");
        Ok(out)
    }
}

#[async_trait]
impl BankFeed for BasiqClient {
    async fn accounts(&self) -> FpResult<Vec<FeedAccount>> {
        let accounts = self.list_accounts().await?;
        info!("basiq returned {} accounts", accounts.len());
        Ok(accounts.into_iter().map(feed_account).collect())
    }

    async fn transactions(&self, since: Option<NaiveDate>) -> FpResult<Vec<FeedTransaction>> {
        let raw = self.list_transactions(since).await?;
        let total = raw.len();
        let mut out = Vec::with_capacity(total);
        for tx in raw.into_iter().filter(BasiqTransaction::is_posted) {
            match feed_transaction(&tx) {
                Some(t) => out.push(t),
                None => warn!("skipping basiq transaction {} with unreadable date or amount", tx.id),
            }
        }
        info!("basiq returned {total} transactions, {} posted", out.len());
        Ok(out)
    }
}

fn feed_account(a: BasiqAccount) -> FeedAccount {
    let balance = a.balance.as_deref().and_then(|b| Decimal::from_str(b).ok());
    let account_mask = a.account_no.as_deref().map(mask_account_number);
    FeedAccount {
        name: a.name.unwrap_or_else(|| a.id.clone()),
        external_id: a.id,
        institution: a.institution,
        account_mask,
        balance,
        currency: a.currency.unwrap_or_else(|| "AUD".to_string()),
    }
}

fn feed_transaction(tx: &BasiqTransaction) -> Option<FeedTransaction> {
    let raw_date = tx.post_date.as_deref().or(tx.transaction_date.as_deref())?;
    let posted_on = parse_date_prefix(raw_date)?;
    let amount = Decimal::from_str(tx.amount.trim()).ok()?;
    Some(FeedTransaction {
        external_id: tx.id.clone(),
        account_external_id: tx.account.clone(),
        posted_on,
        description: tx.description.trim().to_string(),
        amount,
        direction: tx.direction.clone(),
    })
}

/// Basiq sends RFC 3339 timestamps; the posting date is the first ten
/// characters.
fn parse_date_prefix(raw: &str) -> Option<NaiveDate> {
    let prefix = raw.get(..10)?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

/// Keep only the last four digits of an account number.
fn mask_account_number(account_no: &str) -> String {
    let digits: Vec<char> = account_no.chars().filter(|c| c.is_ascii_digit()).collect();
    let start = digits.len().saturating_sub(4);
    digits[start..].iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_requires_credentials() {
        assert!(matches!(
            BasiqClient::new(&BankingConfig::default()),
            Err(FpError::MissingConfig(_))
        ));
    }

    #[test]
    fn test_feed_transaction_conversion() {
        let tx = BasiqTransaction {
            id: "tx-9".into(),
            status: Some("posted".into()),
            description: " SHELL COLES EXPRESS 4321 ".into(),
            amount: "-72.15".into(),
            account: Some("acc-1".into()),
            direction: Some("debit".into()),
            post_date: Some("2024-05-14T00:00:00Z".into()),
            transaction_date: None,
        };
        let feed = feed_transaction(&tx).unwrap();
        assert_eq!(feed.amount, dec!(-72.15));
        assert_eq!(feed.posted_on, NaiveDate::from_ymd_opt(2024, 5, 14).unwrap());
        assert_eq!(feed.description, "SHELL COLES EXPRESS 4321");
    }

    #[test]
    fn test_feed_transaction_falls_back_to_transaction_date() {
        let tx = BasiqTransaction {
            id: "tx-1".into(),
            status: None,
            description: "x".into(),
            amount: "10".into(),
            account: None,
            direction: None,
            post_date: None,
            transaction_date: Some("2024-01-02".into()),
        };
        assert!(feed_transaction(&tx).is_some());
    }

    #[test]
    fn test_bad_amount_is_skipped() {
        let tx = BasiqTransaction {
            id: "tx-1".into(),
            status: None,
            description: "x".into(),
            amount: "n/a".into(),
            account: None,
            direction: None,
            post_date: Some("2024-01-02".into()),
            transaction_date: None,
        };
        assert!(feed_transaction(&tx).is_none());
    }

    #[test]
    fn test_mask_account_number() {
        assert_eq!(mask_account_number("062-000 12345678"), "5678");
        assert_eq!(mask_account_number("12"), "12");
    }
}

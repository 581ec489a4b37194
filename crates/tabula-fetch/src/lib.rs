// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use reqwest::StatusCode;
use reqwest::blocking::Client as HttpClient;
use serde::Deserialize;
use std::time::Duration;
use tabula_app::{DatasetKind, Fetched, PeriodicElement, User};
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_USERS_URL: &str = "https://jsonplaceholder.typicode.com/users";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Blocking client for the users endpoint. The endpoint answers with a JSON
/// array of user objects; fields the table does not show are ignored.
#[derive(Debug, Clone)]
pub struct UsersClient {
    url: Url,
    timeout: Duration,
    http: HttpClient,
}

impl UsersClient {
    pub fn new(users_url: &str, timeout: Duration) -> Result<Self> {
        let trimmed = users_url.trim();
        if trimmed.is_empty() {
            bail!("fetch.users_url must not be empty");
        }
        let url = Url::parse(trimmed)
            .with_context(|| format!("fetch.users_url {trimmed:?} is not a valid URL"))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!(
                "fetch.users_url must use http or https, got {:?}",
                url.scheme()
            );
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self { url, timeout, http })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn fetch_users(&self) -> Result<Vec<User>> {
        debug!(url = %self.url, "fetching users");
        let response = self
            .http
            .get(self.url.clone())
            .send()
            .map_err(|error| connection_error(self.url.as_str(), error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }

        let users: Vec<User> = response.json().context("decode users response")?;
        Ok(users)
    }
}

/// Where user rows come from.
#[derive(Debug, Clone)]
pub enum UsersSource {
    Http(UsersClient),
    Bundled,
}

/// Fetch collaborator for every dataset the application shows.
#[derive(Debug, Clone)]
pub struct Fetcher {
    users: UsersSource,
}

impl Fetcher {
    pub fn new(users: UsersSource) -> Self {
        Self { users }
    }

    pub fn offline() -> Self {
        Self::new(UsersSource::Bundled)
    }

    pub fn is_offline(&self) -> bool {
        matches!(self.users, UsersSource::Bundled)
    }

    pub fn fetch(&self, dataset: DatasetKind) -> Result<Fetched> {
        let fetched = match dataset {
            DatasetKind::Users => Fetched::Users(match &self.users {
                UsersSource::Http(client) => client.fetch_users()?,
                UsersSource::Bundled => bundled_users(),
            }),
            DatasetKind::PeriodicElements => Fetched::PeriodicElements(bundled_elements()),
        };
        info!(
            dataset = dataset.as_str(),
            count = fetched.len(),
            "dataset fetched"
        );
        Ok(fetched)
    }
}

fn connection_error(url: &str, error: reqwest::Error) -> anyhow::Error {
    if error.is_timeout() {
        return anyhow!("request to {url} timed out -- raise fetch.timeout or use --offline");
    }
    anyhow!("cannot reach {url} -- check the network or run with --offline ({error})")
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Text(String),
    Detailed { message: String },
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(body) {
        let message = match parsed.error {
            Some(ErrorBody::Text(message)) | Some(ErrorBody::Detailed { message }) => {
                Some(message)
            }
            None => parsed.message,
        };
        if let Some(message) = message.filter(|message| !message.is_empty()) {
            return anyhow!("server error ({}): {}", status.as_u16(), message);
        }
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() && trimmed.len() < 100 && !trimmed.contains('{') {
        return anyhow!("server error ({}): {}", status.as_u16(), trimmed);
    }

    anyhow!("server returned {}", status.as_u16())
}

const ELEMENTS: [(i64, &str, f64, &str); 10] = [
    (1, "Hydrogen", 1.0079, "H"),
    (2, "Helium", 4.0026, "He"),
    (3, "Lithium", 6.941, "Li"),
    (4, "Beryllium", 9.0122, "Be"),
    (5, "Boron", 10.811, "B"),
    (6, "Carbon", 12.0107, "C"),
    (7, "Nitrogen", 14.0067, "N"),
    (8, "Oxygen", 15.9994, "O"),
    (9, "Fluorine", 18.9984, "F"),
    (10, "Neon", 20.1797, "Ne"),
];

const USERS: [(i64, &str, &str, &str, &str); 10] = [
    (1, "Leanne Graham", "Bret", "Sincere@april.biz", "1-770-736-8031 x56442"),
    (2, "Ervin Howell", "Antonette", "Shanna@melissa.tv", "010-692-6593 x09125"),
    (3, "Clementine Bauch", "Samantha", "Nathan@yesenia.net", "1-463-123-4447"),
    (4, "Patricia Lebsack", "Karianne", "Julianne.OConner@kory.org", "493-170-9623 x156"),
    (5, "Chelsey Dietrich", "Kamren", "Lucio_Hettinger@annie.ca", "(254)954-1289"),
    (6, "Mrs. Dennis Schulist", "Leopoldo_Corkery", "Karley_Dach@jasper.info", "1-477-935-8478 x6430"),
    (7, "Kurtis Weissnat", "Elwyn.Skiles", "Telly.Hoeger@billy.biz", "210.067.6132"),
    (8, "Nicholas Runolfsdottir V", "Maxime_Nienow", "Sherwood@rosamond.me", "586.493.6943 x140"),
    (9, "Glenna Reichert", "Delphine", "Chaim_McDermott@dana.io", "(775)976-6794 x41206"),
    (10, "Clementina DuBuque", "Moriah.Stanton", "Rey.Padberg@karina.biz", "024-648-3804"),
];

/// The first ten elements of the periodic table.
pub fn bundled_elements() -> Vec<PeriodicElement> {
    ELEMENTS
        .iter()
        .map(|(id, name, weight, symbol)| PeriodicElement {
            id: *id,
            name: (*name).to_owned(),
            weight: *weight,
            symbol: (*symbol).to_owned(),
        })
        .collect()
}

/// Snapshot of the users endpoint, served in offline mode.
pub fn bundled_users() -> Vec<User> {
    USERS
        .iter()
        .map(|(id, name, username, email, phone)| User {
            id: *id,
            name: (*name).to_owned(),
            username: (*username).to_owned(),
            email: (*email).to_owned(),
            phone: (*phone).to_owned(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{Fetcher, UsersClient, bundled_elements, bundled_users, clean_error_response};
    use reqwest::StatusCode;
    use std::collections::BTreeSet;
    use std::time::Duration;
    use tabula_app::{DatasetKind, Fetched};

    #[test]
    fn bundled_datasets_have_unique_ids() {
        let users = bundled_users();
        let ids = users.iter().map(|user| user.id).collect::<BTreeSet<_>>();
        assert_eq!(ids.len(), users.len());

        let elements = bundled_elements();
        assert_eq!(elements.len(), 10);
        assert_eq!(elements[1].name, "Helium");
    }

    #[test]
    fn client_rejects_unusable_urls() {
        let timeout = Duration::from_secs(1);
        let empty = UsersClient::new("  ", timeout).expect_err("empty url");
        assert!(empty.to_string().contains("must not be empty"));

        let garbage = UsersClient::new("not a url", timeout).expect_err("garbage url");
        assert!(garbage.to_string().contains("not a valid URL"));

        let ftp = UsersClient::new("ftp://example.com/users", timeout).expect_err("ftp url");
        assert!(ftp.to_string().contains("http or https"));
    }

    #[test]
    fn offline_fetcher_never_touches_the_network() {
        let fetcher = Fetcher::offline();
        assert!(fetcher.is_offline());
        let fetched = fetcher.fetch(DatasetKind::Users).expect("bundled users");
        assert!(matches!(fetched, Fetched::Users(ref users) if users.len() == 10));
        let elements = fetcher
            .fetch(DatasetKind::PeriodicElements)
            .expect("bundled elements");
        assert_eq!(elements.dataset(), DatasetKind::PeriodicElements);
    }

    #[test]
    fn error_bodies_are_condensed() {
        let nested = clean_error_response(
            StatusCode::BAD_GATEWAY,
            r#"{"error":{"message":"upstream down"}}"#,
        );
        assert_eq!(nested.to_string(), "server error (502): upstream down");

        let flat = clean_error_response(StatusCode::NOT_FOUND, r#"{"message":"no such path"}"#);
        assert_eq!(flat.to_string(), "server error (404): no such path");

        let plain = clean_error_response(StatusCode::INTERNAL_SERVER_ERROR, "boom");
        assert_eq!(plain.to_string(), "server error (500): boom");

        let html = clean_error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("<html>{}</html>", "x".repeat(200)),
        );
        assert_eq!(html.to_string(), "server returned 500");
    }
}

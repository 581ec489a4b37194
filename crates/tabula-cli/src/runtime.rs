// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use tabula_app::{DatasetKind, Fetched};
use tabula_fetch::Fetcher;
use tracing::warn;

pub struct FetchRuntime {
    fetcher: Fetcher,
}

impl FetchRuntime {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }
}

impl tabula_tui::AppRuntime for FetchRuntime {
    fn fetch(&mut self, dataset: DatasetKind) -> Result<Fetched> {
        self.fetcher.fetch(dataset).inspect_err(|error| {
            warn!(dataset = dataset.as_str(), error = %format!("{error:#}"), "fetch failed");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::FetchRuntime;
    use anyhow::Result;
    use std::time::Duration;
    use tabula_app::{AppCommand, AppState, DatasetKind, TableCommand, TableId};
    use tabula_fetch::{Fetcher, UsersClient, UsersSource};
    use tabula_tui::AppRuntime;

    #[test]
    fn offline_runtime_loads_both_tables() -> Result<()> {
        let mut runtime = FetchRuntime::new(Fetcher::offline());
        let mut state = AppState::default();
        for kind in DatasetKind::ALL {
            let fetched = runtime.fetch(kind)?;
            state.dispatch(AppCommand::FetchSucceeded(fetched));
        }
        assert_eq!(state.users().records().len(), 10);
        assert_eq!(state.elements().records().len(), 10);
        assert!(
            state
                .dispatch(AppCommand::Table(TableId::users(), TableCommand::Load))
                .is_empty()
        );
        Ok(())
    }

    #[test]
    fn unreachable_users_endpoint_fails_only_users() -> Result<()> {
        let client = UsersClient::new("http://127.0.0.1:1/users", Duration::from_millis(50))?;
        let mut runtime = FetchRuntime::new(Fetcher::new(UsersSource::Http(client)));
        let error = runtime
            .fetch(DatasetKind::Users)
            .expect_err("closed port should fail");
        assert!(error.to_string().contains("--offline"));
        assert!(runtime.fetch(DatasetKind::PeriodicElements).is_ok());
        Ok(())
    }
}

// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::time::{Duration, Instant};
use tabula_app::{
    AppCommand, AppState, EngineSettings, Fetched, PeriodicElement, TableCommand, TableId, User,
};

const FIRST_NAMES: [&str; 16] = [
    "Avery", "Jordan", "Taylor", "Riley", "Morgan", "Casey", "Alex", "Quinn", "Parker", "Drew",
    "Kai", "Elliot", "Robin", "Cameron", "Hayden", "Rowan",
];
const LAST_NAMES: [&str; 18] = [
    "Walker", "Martin", "Hill", "Evans", "Lopez", "Gray", "Ward", "Young", "Diaz", "Reed",
    "Campbell", "Turner", "Flores", "Bennett", "Price", "Morris", "Foster", "Brooks",
];
const DOMAINS: [&str; 5] = [
    "example.com",
    "mail.local",
    "inbox.net",
    "post.io",
    "letters.org",
];

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }
}

/// Seeded generator for user rows. The same seed always yields the same
/// users.
#[derive(Debug, Clone)]
pub struct UserFaker {
    rng: DeterministicRng,
}

impl UserFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
        }
    }

    pub fn user(&mut self, id: i64) -> User {
        let first = self.pick(&FIRST_NAMES);
        let last = self.pick(&LAST_NAMES);
        let domain = self.pick(&DOMAINS);
        User {
            id,
            name: format!("{first} {last}"),
            username: format!("{}{}", &first[..1], last).to_ascii_lowercase(),
            email: format!(
                "{}.{}@{domain}",
                first.to_ascii_lowercase(),
                last.to_ascii_lowercase()
            ),
            phone: format!(
                "({:03}) {:03}-{:04}",
                200 + self.rng.int_n(800),
                200 + self.rng.int_n(800),
                self.rng.int_n(10_000),
            ),
        }
    }

    pub fn users(&mut self, count: usize) -> Vec<User> {
        (1..=count as i64).map(|id| self.user(id)).collect()
    }

    fn pick<'a>(&mut self, values: &[&'a str]) -> &'a str {
        values[self.rng.int_n(values.len())]
    }
}

/// The first three users of the public placeholder API.
pub fn sample_users() -> Vec<User> {
    vec![
        User {
            id: 1,
            name: "Leanne Graham".to_owned(),
            username: "Bret".to_owned(),
            email: "Sincere@april.biz".to_owned(),
            phone: "1-770-736-8031 x56442".to_owned(),
        },
        User {
            id: 2,
            name: "Ervin Howell".to_owned(),
            username: "Antonette".to_owned(),
            email: "Shanna@melissa.tv".to_owned(),
            phone: "010-692-6593 x09125".to_owned(),
        },
        User {
            id: 3,
            name: "Clementine Bauch".to_owned(),
            username: "Samantha".to_owned(),
            email: "Nathan@yesenia.net".to_owned(),
            phone: "1-463-123-4447".to_owned(),
        },
    ]
}

/// The first ten elements of the periodic table, as bundled with the app.
pub fn sample_elements() -> Vec<PeriodicElement> {
    tabula_fetch::bundled_elements()
}

/// Elements with ids `1..=count` whose names sort in id order.
pub fn numbered_elements(count: usize) -> Vec<PeriodicElement> {
    (1..=count as i64)
        .map(|id| PeriodicElement {
            id,
            name: format!("Element {id:03}"),
            weight: id as f64,
            symbol: format!("E{id}"),
        })
        .collect()
}

/// A state with both tables bound and both datasets loaded.
pub fn loaded_state(users: Vec<User>, elements: Vec<PeriodicElement>) -> AppState {
    loaded_state_with(EngineSettings::default(), users, elements)
}

pub fn loaded_state_with(
    settings: EngineSettings,
    users: Vec<User>,
    elements: Vec<PeriodicElement>,
) -> AppState {
    let mut state = AppState::new(settings);
    state.dispatch(AppCommand::FetchSucceeded(Fetched::Users(users)));
    state.dispatch(AppCommand::FetchSucceeded(Fetched::PeriodicElements(
        elements,
    )));
    state
}

pub fn users_command(command: TableCommand) -> AppCommand {
    AppCommand::Table(TableId::users(), command)
}

pub fn elements_command(command: TableCommand) -> AppCommand {
    AppCommand::Table(TableId::elements(), command)
}

pub fn after(start: Instant, millis: u64) -> Instant {
    start + Duration::from_millis(millis)
}

#[cfg(test)]
mod tests {
    use super::{UserFaker, numbered_elements, sample_elements};

    #[test]
    fn faker_is_deterministic() {
        let first = UserFaker::new(7).users(5);
        let second = UserFaker::new(7).users(5);
        assert_eq!(first, second);
        assert_eq!(first.iter().map(|u| u.id).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn fixtures_have_unique_ids() {
        let elements = sample_elements();
        assert_eq!(elements.len(), 10);
        assert_eq!(elements[9].symbol, "Ne");
        assert_eq!(numbered_elements(3)[2].name, "Element 003");
    }
}

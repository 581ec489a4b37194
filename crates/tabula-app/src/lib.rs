// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod debounce;
pub mod ids;
pub mod model;
pub mod rank;
pub mod reconcile;
pub mod records;
pub mod scope;
pub mod settings;
pub mod state;
pub mod table;
pub mod view;

pub use debounce::*;
pub use ids::*;
pub use model::*;
pub use rank::*;
pub use records::*;
pub use scope::*;
pub use settings::*;
pub use state::*;
pub use table::*;
pub use view::*;

//! SeaORM entities backing the user store and the issued-token ledger.

pub mod app_user;
pub mod oauth2_token;

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::{CredentialIssuer, Gate, RouteTable, TokenService};
use crate::mail::Mailer;
use crate::storage::{AuthDatabase, UserDirectory};

#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenService>,
    pub issuer: Arc<CredentialIssuer>,
    pub gate: Arc<Gate>,
    pub users: Arc<dyn UserDirectory>,
    /// Concrete handle for health probes
    pub db: Arc<AuthDatabase>,
}

impl AppState {
    pub fn new(tokens: Arc<TokenService>, db: Arc<AuthDatabase>, mailer: Arc<dyn Mailer>) -> Self {
        let issuer = CredentialIssuer::new(tokens.clone(), db.clone(), mailer);
        let gate = Gate::new(RouteTable::default_table(), tokens.clone());
        Self {
            tokens,
            issuer: Arc::new(issuer),
            gate: Arc::new(gate),
            users: db.clone(),
            db,
        }
    }
}

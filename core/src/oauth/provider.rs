/*
 * provider.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Scadenziario, a mailbox date-extraction exporter.
 *
 * Scadenziario is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Scadenziario is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Scadenziario.  If not, see <http://www.gnu.org/licenses/>.
 */

//! OAuth2 provider abstraction: authorization-server endpoints, client id,
//! scopes. One concrete provider — Microsoft — parameterized by tenant.

/// Trait describing an OAuth2 provider for the device-code grant.
pub trait OAuthProvider: Send + Sync {
    /// Short identifier, e.g. "microsoft".
    fn provider_id(&self) -> &str;
    /// Device authorization endpoint URL.
    fn device_authorization_url(&self) -> &str;
    /// Token endpoint URL.
    fn token_url(&self) -> &str;
    /// Scopes to request (space-joined when building form bodies).
    fn scopes(&self) -> &[&str];
    /// OAuth2 client_id.
    fn client_id(&self) -> &str;
}

/// Microsoft identity platform provider for Graph mail access.
///
/// Authority: `https://login.microsoftonline.com/{tenant}` where tenant is a
/// directory id or "common".
pub struct MicrosoftProvider {
    client_id: String,
    device_authorization_url: String,
    token_url: String,
}

impl MicrosoftProvider {
    pub fn new(client_id: impl Into<String>, tenant: &str) -> Self {
        let authority = format!("https://login.microsoftonline.com/{}", tenant);
        Self {
            client_id: client_id.into(),
            device_authorization_url: format!("{}/oauth2/v2.0/devicecode", authority),
            token_url: format!("{}/oauth2/v2.0/token", authority),
        }
    }
}

impl OAuthProvider for MicrosoftProvider {
    fn provider_id(&self) -> &str {
        "microsoft"
    }

    fn device_authorization_url(&self) -> &str {
        &self.device_authorization_url
    }

    fn token_url(&self) -> &str {
        &self.token_url
    }

    fn scopes(&self) -> &[&str] {
        &[
            "https://graph.microsoft.com/Mail.Read",
            "https://graph.microsoft.com/User.Read",
            "offline_access",
            "openid",
        ]
    }

    fn client_id(&self) -> &str {
        &self.client_id
    }
}

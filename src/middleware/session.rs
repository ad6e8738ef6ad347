// src/middleware/session.rs

// Plumbing dos cookies de autenticação. Os tokens viajam APENAS em cookies
// HttpOnly; corpo e headers de resposta nunca carregam credencial. O de
// acesso dura o mesmo que o JWT, o de renovação cobre o ciclo da sessão.

use axum_extra::extract::cookie::{Cookie, SameSite};

pub const AUTH_COOKIE: &str = "auth-token";
pub const REFRESH_COOKIE: &str = "refresh-token";

const AUTH_COOKIE_MAX_AGE: time::Duration = time::Duration::hours(1);
const REFRESH_COOKIE_MAX_AGE: time::Duration = time::Duration::days(30);

pub fn auth_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((AUTH_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(AUTH_COOKIE_MAX_AGE)
        .build()
}

pub fn refresh_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(REFRESH_COOKIE_MAX_AGE)
        .build()
}

// Max-Age zero manda o navegador derrubar o cookie
pub fn clear_auth_cookie() -> Cookie<'static> {
    expired(AUTH_COOKIE)
}

pub fn clear_refresh_cookie() -> Cookie<'static> {
    expired(REFRESH_COOKIE)
}

fn expired(name: &'static str) -> Cookie<'static> {
    Cookie::build((name, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::ZERO)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookies_de_token_sao_httponly_lax_na_raiz() {
        let cookie = auth_cookie("jwt".to_string(), false);
        assert_eq!(cookie.name(), AUTH_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));

        let refresh = refresh_cookie("opaque".to_string(), true);
        assert_eq!(refresh.secure(), Some(true));
        assert_eq!(refresh.max_age(), Some(time::Duration::days(30)));
    }

    #[test]
    fn limpeza_zera_o_max_age() {
        assert_eq!(clear_auth_cookie().max_age(), Some(time::Duration::ZERO));
        assert_eq!(clear_refresh_cookie().max_age(), Some(time::Duration::ZERO));
    }
}

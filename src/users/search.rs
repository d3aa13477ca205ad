//! Listing filter: search terms and pagination for `GET /users`.

use super::dto::ListUsersQuery;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    Username,
    Email,
}

impl SearchField {
    pub fn column(self) -> &'static str {
        match self {
            SearchField::Username => "username",
            SearchField::Email => "email",
        }
    }
}

/// Case-insensitive substring match of `term` against `field`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTerm {
    pub field: SearchField,
    /// Sanitized but unescaped.
    pub term: String,
}

impl SearchTerm {
    /// `ILIKE` pattern with `%` and `_` escaped by backslash.
    pub fn like_pattern(&self) -> String {
        format!("%{}%", escape_like(&self.term))
    }

    pub fn matches(&self, value: &str) -> bool {
        value.to_lowercase().contains(&self.term.to_lowercase())
    }
}

/// Terms are OR-combined; an empty list matches every live user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    pub terms: Vec<SearchTerm>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl UserFilter {
    pub fn from_query(q: &ListUsersQuery) -> Self {
        let mut terms = Vec::new();
        if let Some(term) = q.query.as_deref().and_then(sanitize_term) {
            terms.push(SearchTerm {
                field: SearchField::Username,
                term: term.clone(),
            });
            terms.push(SearchTerm {
                field: SearchField::Email,
                term,
            });
        }
        if let Some(term) = q.username.as_deref().and_then(sanitize_term) {
            terms.push(SearchTerm {
                field: SearchField::Username,
                term,
            });
        }
        if let Some(term) = q.email.as_deref().and_then(sanitize_term) {
            terms.push(SearchTerm {
                field: SearchField::Email,
                term,
            });
        }

        let limit = parse_number(q.limit.as_deref()).filter(|l| *l > 0);
        let offset = match (limit, parse_number(q.page.as_deref())) {
            (Some(limit), Some(page)) => Some((page.max(1) - 1).saturating_mul(limit)),
            _ => None,
        };

        Self {
            terms,
            limit,
            offset,
        }
    }

    pub fn matches(&self, username: &str, email: &str) -> bool {
        self.terms.is_empty()
            || self.terms.iter().any(|t| match t.field {
                SearchField::Username => t.matches(username),
                SearchField::Email => t.matches(email),
            })
    }
}

fn parse_number(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|v| v.trim().parse().ok())
}

/// Strips quote, backslash and semicolon characters. `None` if nothing is left.
pub fn sanitize_term(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '\'' | '"' | ';' | '\\'))
        .collect();
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Escapes LIKE wildcards. Input must already be sanitized (no backslashes).
pub fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

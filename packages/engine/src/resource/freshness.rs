//! Freshness lifetime of an origin response

use http::{HeaderMap, header};

use crate::config::FreshnessPolicy;
use crate::http::headers::has_pragma_no_cache;
use crate::http::{CacheControl, header_lossy, parse_http_date};

/// Seconds the response may be served from cache.
///
/// `no-store`/`no-cache`/`private` and `Pragma: no-cache` give 0; otherwise
/// `s-maxage`, `max-age`, `Expires` (relative to `Date`, or `now`), and
/// finally 10% of the `Last-Modified` age. Unparseable dates give 0. Domains
/// known to be state-less are floored at the policy minimum unless the
/// response is `no-store`; everything is capped at the policy maximum.
#[must_use]
pub fn max_age_of(
    headers: &HeaderMap,
    now: u64,
    known_stateless: bool,
    policy: &FreshnessPolicy,
) -> u64 {
    let cache_control = CacheControl::from_headers(headers);
    let mut max_age = origin_max_age(headers, cache_control, now);
    if known_stateless && !cache_control.is_some_and(|cc| cc.no_store) {
        max_age = max_age.max(policy.stateless_min_max_age);
    }
    max_age.min(policy.max_max_age)
}

fn origin_max_age(headers: &HeaderMap, cache_control: Option<CacheControl>, now: u64) -> u64 {
    if let Some(cc) = cache_control {
        if cc.forbids_caching() {
            return 0;
        }
        if let Some(secs) = cc.s_maxage.or(cc.max_age) {
            return secs;
        }
    }
    if has_pragma_no_cache(headers) {
        return 0;
    }

    if let Some(expires) = header_lossy(headers, &header::EXPIRES) {
        let date = match header_lossy(headers, &header::DATE).map(parse_http_date) {
            Some(Ok(date)) => date,
            _ => now,
        };
        return match parse_http_date(expires) {
            Ok(expires) => expires.saturating_sub(date),
            Err(e) => {
                // "0" and "-1" are common ways of saying "already expired".
                if expires.trim().parse::<i64>().is_err() {
                    tracing::warn!(
                        target: "htmlspeed::cache",
                        expires,
                        error = %e,
                        "Unparseable Expires header, not caching"
                    );
                }
                0
            }
        };
    }

    if let Some(last_modified) = header_lossy(headers, &header::LAST_MODIFIED) {
        return match parse_http_date(last_modified) {
            Ok(modified) => now.saturating_sub(modified) / 10,
            Err(e) => {
                tracing::warn!(
                    target: "htmlspeed::cache",
                    last_modified,
                    error = %e,
                    "Unparseable Last-Modified header, not caching"
                );
                0
            }
        };
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::fmt_http_date;
    use http::HeaderValue;

    const NOW: u64 = 1_700_000_000;

    fn headers(pairs: &[(header::HeaderName, String)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn last_modified_heuristic_is_ten_percent() {
        let policy = FreshnessPolicy::default();
        let h = headers(&[(header::LAST_MODIFIED, fmt_http_date(NOW - 100))]);
        assert_eq!(max_age_of(&h, NOW, false, &policy), 10);
        assert_eq!(
            max_age_of(&h, NOW, true, &policy),
            policy.stateless_min_max_age
        );
    }

    #[test]
    fn cache_control_wins_over_expires() {
        let policy = FreshnessPolicy::default();
        let h = headers(&[
            (header::CACHE_CONTROL, "public, max-age=120, s-maxage=600".into()),
            (header::EXPIRES, fmt_http_date(NOW + 30)),
        ]);
        assert_eq!(max_age_of(&h, NOW, false, &policy), 600);
    }

    #[test]
    fn expires_is_relative_to_date() {
        let policy = FreshnessPolicy::default();
        let h = headers(&[
            (header::DATE, fmt_http_date(NOW - 50)),
            (header::EXPIRES, fmt_http_date(NOW + 50)),
        ]);
        assert_eq!(max_age_of(&h, NOW, false, &policy), 100);
    }

    #[test]
    fn uncacheable_responses_are_zero() {
        let policy = FreshnessPolicy::default();
        for h in [
            headers(&[(header::CACHE_CONTROL, "no-cache".into())]),
            headers(&[(header::CACHE_CONTROL, "private, max-age=60".into())]),
            headers(&[
                (header::PRAGMA, "no-cache".into()),
                (header::LAST_MODIFIED, fmt_http_date(NOW - 1000)),
            ]),
            headers(&[(header::EXPIRES, "yesterday-ish".into())]),
            headers(&[(header::LAST_MODIFIED, "garbage".into())]),
            headers(&[]),
        ] {
            assert_eq!(max_age_of(&h, NOW, false, &policy), 0, "{h:?}");
        }
    }

    #[test]
    fn no_store_is_not_floored_and_huge_values_are_capped() {
        let policy = FreshnessPolicy::default();
        let h = headers(&[(header::CACHE_CONTROL, "no-store".into())]);
        assert_eq!(max_age_of(&h, NOW, true, &policy), 0);
        let h = headers(&[(header::CACHE_CONTROL, "max-age=999999999".into())]);
        assert_eq!(max_age_of(&h, NOW, false, &policy), policy.max_max_age);
    }
}

//! Visit variants
//!
//! A variant is a single character naming how aggressively a page's
//! sub-resources are inlined for one browser class on one visit. Page
//! entries are cached per variant; every other resource kind lives in the
//! canonical non-page slot.

pub mod etag;
pub mod policy;

use std::fmt;

pub use etag::{ParsedEtag, digest_token, is_html_speed_etag, md5_digest, parse_etag, to_etag};
pub use policy::{VARIANT_PARAM, VISIT_COOKIE, variant_of};

/// Every legal page variant character, grouped by browser class in visit order.
pub const ALL_VARIANTS: &str = "0123456789abcde";

const VISITS_PER_CLASS: u8 = 5;

/// Browser family the inlining density is tuned for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrowserClass {
    Desktop,
    /// IE 6-8: data URIs capped at 32 KiB
    Ie8,
    Mobile,
}

impl BrowserClass {
    /// Classify a `User-Agent` header value.
    #[must_use]
    pub fn from_user_agent(user_agent: Option<&str>) -> Self {
        let Some(ua) = user_agent else {
            return BrowserClass::Desktop;
        };
        if ["MSIE 6.", "MSIE 7.", "MSIE 8."].iter().any(|m| ua.contains(m)) {
            BrowserClass::Ie8
        } else if ["Mobile", "Android", "iPhone", "iPad", "Opera Mini", "IEMobile"]
            .iter()
            .any(|m| ua.contains(m))
        {
            BrowserClass::Mobile
        } else {
            BrowserClass::Desktop
        }
    }

    fn base(self) -> u8 {
        match self {
            BrowserClass::Desktop => 0,
            BrowserClass::Ie8 => 1,
            BrowserClass::Mobile => 2,
        }
    }
}

/// Visit number, from the first (everything inlined) to the fourth (nothing inlined)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Visit {
    First,
    /// First request from a browser that has been here before but lost its cache
    FirstPlus,
    Second,
    Third,
    Fourth,
}

impl Visit {
    const ORDER: [Visit; 5] = [
        Visit::First,
        Visit::FirstPlus,
        Visit::Second,
        Visit::Third,
        Visit::Fourth,
    ];

    #[must_use]
    pub fn index(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub fn from_index(index: u8) -> Visit {
        Self::ORDER[usize::from(index.min(VISITS_PER_CLASS - 1))]
    }

    /// Number of inlinable references withheld from inlining, or `None` when
    /// this visit never inlines.
    #[must_use]
    pub fn withheld(self, total: usize) -> Option<usize> {
        match self {
            Visit::First => Some(0),
            Visit::FirstPlus | Visit::Second => Some(total / 3),
            Visit::Third => Some(total * 2 / 3),
            Visit::Fourth => None,
        }
    }
}

/// A visit-variant code
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Variant(u8);

impl Variant {
    /// The slot every non-page resource canonicalizes to
    pub const NON_PAGE: Variant = Variant(b'#');

    #[must_use]
    pub fn new(browser: BrowserClass, visit: Visit) -> Self {
        let index = browser.base() * VISITS_PER_CLASS + visit.index();
        Variant(ALL_VARIANTS.as_bytes()[usize::from(index)])
    }

    #[must_use]
    pub fn first_visit(browser: BrowserClass) -> Self {
        Self::new(browser, Visit::First)
    }

    /// Parse a variant character; accepts every page variant and `#`.
    #[must_use]
    pub fn from_char(c: char) -> Option<Self> {
        if c == '#' {
            return Some(Self::NON_PAGE);
        }
        if c.is_ascii() && ALL_VARIANTS.as_bytes().contains(&(c as u8)) {
            Some(Variant(c as u8))
        } else {
            None
        }
    }

    #[must_use]
    pub fn from_byte(b: u8) -> Option<Self> {
        Self::from_char(char::from(b))
    }

    #[must_use]
    pub fn as_char(self) -> char {
        char::from(self.0)
    }

    #[must_use]
    pub fn as_byte(self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn is_page(self) -> bool {
        self != Self::NON_PAGE
    }

    fn index(self) -> Option<u8> {
        ALL_VARIANTS
            .as_bytes()
            .iter()
            .position(|&b| b == self.0)
            .map(|p| p as u8)
    }

    #[must_use]
    pub fn browser(self) -> Option<BrowserClass> {
        self.index().map(|i| match i / VISITS_PER_CLASS {
            0 => BrowserClass::Desktop,
            1 => BrowserClass::Ie8,
            _ => BrowserClass::Mobile,
        })
    }

    #[must_use]
    pub fn visit(self) -> Option<Visit> {
        self.index().map(|i| Visit::from_index(i % VISITS_PER_CLASS))
    }

    /// Variant served on the browser's next visit; the fourth visit is terminal.
    #[must_use]
    pub fn next_visit(self) -> Self {
        self.shifted(1)
    }

    /// Move `steps` visits towards the fourth visit within the same browser class.
    #[must_use]
    pub fn shifted(self, steps: u8) -> Self {
        match (self.browser(), self.visit()) {
            (Some(browser), Some(visit)) => {
                Self::new(browser, Visit::from_index(visit.index().saturating_add(steps)))
            }
            _ => self,
        }
    }
}

impl fmt::Debug for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Variant('{}')", self.as_char())
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_map_to_class_and_visit() {
        for (i, c) in ALL_VARIANTS.chars().enumerate() {
            let v = Variant::from_char(c).expect("legal variant");
            let rebuilt = Variant::new(v.browser().unwrap(), v.visit().unwrap());
            assert_eq!(rebuilt, v, "variant #{i}");
        }
        assert_eq!(Variant::new(BrowserClass::Ie8, Visit::First).as_char(), '5');
        assert_eq!(Variant::new(BrowserClass::Mobile, Visit::Fourth).as_char(), 'e');
    }

    #[test]
    fn visit_progression_saturates_inside_class() {
        let v = Variant::first_visit(BrowserClass::Mobile);
        assert_eq!(v.next_visit().as_char(), 'b');
        assert_eq!(v.shifted(10).as_char(), 'e');
        assert_eq!(Variant::from_char('4').unwrap().next_visit().as_char(), '4');
        assert_eq!(Variant::NON_PAGE.next_visit(), Variant::NON_PAGE);
    }

    #[test]
    fn withheld_quota_follows_visit() {
        assert_eq!(Visit::First.withheld(9), Some(0));
        assert_eq!(Visit::FirstPlus.withheld(9), Some(3));
        assert_eq!(Visit::Second.withheld(10), Some(3));
        assert_eq!(Visit::Third.withheld(9), Some(6));
        assert_eq!(Visit::Fourth.withheld(9), None);
    }

    #[test]
    fn user_agent_classification() {
        let ie = "Mozilla/4.0 (compatible; MSIE 8.0; Windows NT 6.1)";
        let phone = "Mozilla/5.0 (iPhone; CPU iPhone OS 16_0 like Mac OS X)";
        assert_eq!(BrowserClass::from_user_agent(Some(ie)), BrowserClass::Ie8);
        assert_eq!(BrowserClass::from_user_agent(Some(phone)), BrowserClass::Mobile);
        assert_eq!(BrowserClass::from_user_agent(None), BrowserClass::Desktop);
    }

    #[test]
    fn unknown_characters_are_rejected() {
        assert!(Variant::from_char('z').is_none());
        assert!(Variant::from_char('#').is_some_and(|v| !v.is_page()));
    }
}

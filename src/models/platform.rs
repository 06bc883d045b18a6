use serde::{Deserialize, Serialize};

/// Global platform configuration, stored as a single JSON document.
///
/// Every field has a default so a partially written document still loads.
/// Money values are in cents.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PlatformSettings {
    pub app_name: String,
    pub support_link: String,
    pub bkash: String,
    pub nagad: String,
    pub premium_bkash: String,
    pub premium_nagad: String,
    pub min_withdraw_in_cents: i64,
    pub max_withdraw_in_cents: i64,
    pub min_deposit_in_cents: i64,
    pub free_withdraw_limit: u32,
    pub free_withdraw_max_in_cents: i64,
    pub min_transfer_in_cents: i64,
    pub task_enabled: bool,
    pub premium_cost_in_cents: i64,
    pub premium_enabled: bool,
    pub ref_com_l1_in_cents: i64,
    pub ref_com_l2_in_cents: i64,
    pub ref_com_l3_in_cents: i64,
    pub social_rates: SocialRates,
    pub social_desc: SocialDesc,
    pub promo: Promo,
    pub slider_images: Vec<String>,
}

impl Default for PlatformSettings {
    fn default() -> Self {
        PlatformSettings {
            app_name: "Next Level Earn".to_string(),
            support_link: "https://t.me/support".to_string(),
            bkash: "01700000000".to_string(),
            nagad: "01800000000".to_string(),
            premium_bkash: String::new(),
            premium_nagad: String::new(),
            min_withdraw_in_cents: 100 * 100,
            max_withdraw_in_cents: 10_000 * 100,
            min_deposit_in_cents: 50 * 100,
            free_withdraw_limit: 1,
            free_withdraw_max_in_cents: 20 * 100,
            min_transfer_in_cents: 50 * 100,
            task_enabled: true,
            premium_cost_in_cents: 500 * 100,
            premium_enabled: true,
            ref_com_l1_in_cents: 100 * 100,
            ref_com_l2_in_cents: 50 * 100,
            ref_com_l3_in_cents: 20 * 100,
            social_rates: SocialRates::default(),
            social_desc: SocialDesc::default(),
            promo: Promo::default(),
            slider_images: Vec::new(),
        }
    }
}

impl PlatformSettings {
    /// Commission paid to the referrer `level` steps up the chain (1-based).
    pub fn referral_commission(&self, level: usize) -> Option<i64> {
        match level {
            1 => Some(self.ref_com_l1_in_cents),
            2 => Some(self.ref_com_l2_in_cents),
            3 => Some(self.ref_com_l3_in_cents),
            _ => None,
        }
    }

    /// Number the user should pay into for a premium request.
    pub fn premium_payment_number(&self, method: &str) -> &str {
        let (premium, fallback) = if method.eq_ignore_ascii_case("bkash") {
            (&self.premium_bkash, &self.bkash)
        } else {
            (&self.premium_nagad, &self.nagad)
        };

        if premium.is_empty() {
            fallback
        } else {
            premium
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SocialPlatform {
    Gmail,
    Facebook,
    Instagram,
    Tiktok,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SocialRates {
    pub gmail_in_cents: i64,
    pub facebook_in_cents: i64,
    pub instagram_in_cents: i64,
    pub tiktok_in_cents: i64,
}

impl Default for SocialRates {
    fn default() -> Self {
        SocialRates {
            gmail_in_cents: 10 * 100,
            facebook_in_cents: 5 * 100,
            instagram_in_cents: 5 * 100,
            tiktok_in_cents: 5 * 100,
        }
    }
}

impl SocialRates {
    pub fn rate(&self, platform: SocialPlatform) -> i64 {
        match platform {
            SocialPlatform::Gmail => self.gmail_in_cents,
            SocialPlatform::Facebook => self.facebook_in_cents,
            SocialPlatform::Instagram => self.instagram_in_cents,
            SocialPlatform::Tiktok => self.tiktok_in_cents,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SocialDesc {
    pub gmail: String,
    pub facebook: String,
    pub instagram: String,
    pub tiktok: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Promo {
    pub title: String,
    pub desc: String,
    pub link: String,
}

impl Default for Promo {
    fn default() -> Self {
        Promo {
            title: "Special offer 2026".to_string(),
            desc: "Details coming soon.".to_string(),
            link: String::new(),
        }
    }
}

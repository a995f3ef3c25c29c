//! Parameter keys and hit types understood by the tracking SDK.

pub const ANDROID_APP_UID: &str = "AppUID";
pub const ANONYMIZE_IP: &str = "&aip";
pub const APP_ID: &str = "&aid";
pub const APP_INSTALLER_ID: &str = "&aiid";
pub const APP_NAME: &str = "&an";
pub const APP_VERSION: &str = "&av";
pub const CAMPAIGN_CONTENT: &str = "&cc";
pub const CAMPAIGN_ID: &str = "&ci";
pub const CAMPAIGN_KEYWORD: &str = "&ck";
pub const CAMPAIGN_MEDIUM: &str = "&cm";
pub const CAMPAIGN_NAME: &str = "&cn";
pub const CAMPAIGN_SOURCE: &str = "&cs";
pub const CLIENT_ID: &str = "&cid";
pub const CURRENCY_CODE: &str = "&cu";
pub const DESCRIPTION: &str = "&cd";
pub const ENCODING: &str = "&de";
pub const EVENT_ACTION: &str = "&ea";
pub const EVENT_CATEGORY: &str = "&ec";
pub const EVENT_LABEL: &str = "&el";
pub const EVENT_VALUE: &str = "&ev";
pub const EX_DESCRIPTION: &str = "&exd";
pub const EX_FATAL: &str = "&exf";
pub const FLASH_VERSION: &str = "&fl";
pub const HIT_TYPE: &str = "&t";
pub const HOSTNAME: &str = "&dh";
pub const ITEM_CATEGORY: &str = "&iv";
pub const ITEM_NAME: &str = "&in";
pub const ITEM_PRICE: &str = "&ip";
pub const ITEM_QUANTITY: &str = "&iq";
pub const ITEM_SKU: &str = "&ic";
pub const JAVA_ENABLED: &str = "&je";
pub const LANGUAGE: &str = "&ul";
pub const LOCATION: &str = "&dl";
pub const NON_INTERACTION: &str = "&ni";
pub const PAGE: &str = "&dp";
pub const REFERRER: &str = "&dr";
pub const SAMPLE_RATE: &str = "&sf";
pub const SCREEN_COLORS: &str = "&sd";
pub const SCREEN_NAME: &str = "&cd";
pub const SCREEN_RESOLUTION: &str = "&sr";
pub const SESSION_CONTROL: &str = "&sc";
pub const SOCIAL_ACTION: &str = "&sa";
pub const SOCIAL_NETWORK: &str = "&sn";
pub const SOCIAL_TARGET: &str = "&st";
pub const TIMING_CATEGORY: &str = "&utc";
pub const TIMING_LABEL: &str = "&utl";
pub const TIMING_VALUE: &str = "&utt";
pub const TIMING_VAR: &str = "&utv";
pub const TITLE: &str = "&dt";
pub const TRACKING_ID: &str = "&tid";
pub const TRANSACTION_AFFILIATION: &str = "&ta";
pub const TRANSACTION_ID: &str = "&ti";
pub const TRANSACTION_REVENUE: &str = "&tr";
pub const TRANSACTION_SHIPPING: &str = "&ts";
pub const TRANSACTION_TAX: &str = "&tt";
pub const USE_SECURE: &str = "useSecure";
pub const VIEWPORT_SIZE: &str = "&vp";

/// Value of the [`HIT_TYPE`] parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HitType {
    AppView,
    Event,
    Exception,
    Item,
    Social,
    Timing,
    Transaction,
}

impl HitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HitType::AppView => "appview",
            HitType::Event => "event",
            HitType::Exception => "exception",
            HitType::Item => "item",
            HitType::Social => "social",
            HitType::Timing => "timing",
            HitType::Transaction => "transaction",
        }
    }
}

/// Key for custom dimension `index` (`cd<index>`).
pub fn custom_dimension(index: u32) -> String {
    format!("cd{index}")
}

/// Key for custom metric `index` (`cm<index>`).
pub fn custom_metric(index: u32) -> String {
    format!("cm{index}")
}

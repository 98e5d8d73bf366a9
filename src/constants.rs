//! Column names shared by the loader, the serialized account frame and the
//! map encoding. The frame is keyed by these exact strings so the view layer
//! can name columns the same way the source reports do.

// Ready report columns
pub const SAV_NAME: &str = "SAV Name";
pub const ACCOUNT_NAME: &str = "Account Name";
pub const BUSINESS_ENTITY: &str = "Business Entity";
pub const PRODUCT_LIST_PRICE: &str = "Product List Price $";
pub const TOTAL_SPEND: &str = "Total Spend";
pub const LDOS_FY: &str = "LDOS FY";
pub const INSTALL_SITE_NAME: &str = "Install Site Name";
pub const INSTALL_SITE_ADDRESS: &str = "Install Site Address 1";
pub const INSTALL_SITE_CITY: &str = "Install Site City";
pub const INSTALL_SITE_STATE: &str = "Install Site State";
pub const INSTALL_SITE_POSTAL_CODE: &str = "Install Site Postal Code";

// SPOT report columns
pub const TOP_EQUIPMAKE_SHARE: &str = "Top EquipMake Share%";
pub const TOP_PROVIDER_SHARE: &str = "Top Provider Share%";
pub const OPPTY_SCORE: &str = "Oppty Score";
pub const THREAT_SCORE: &str = "Threat Score";
pub const BUDGET_K: &str = "Budget ($K)";
pub const REMAINING_BUDGET_K: &str = "Remaining Budget ($K)";

// Derived columns
pub const PRIMARY_VENDOR: &str = "Primary Vendor";
pub const PRIMARY_VENDOR_SHARE: &str = "Primary Vendor Share %";
pub const TOP_PARTNER: &str = "Top Partner";
pub const TOP_PARTNER_SHARE: &str = "Top Partner Share %";
pub const VERTICAL: &str = "Vertical";
pub const TOTAL_SITES: &str = "Total Sites";
pub const TOTAL_LDOS: &str = "Total LDoS";
pub const LATITUDE: &str = "Latitude";
pub const LONGITUDE: &str = "Longitude";

/// Ready columns kept after load, in source naming.
pub const READY_COLUMNS: &[&str] = &[
    SAV_NAME,
    BUSINESS_ENTITY,
    PRODUCT_LIST_PRICE,
    LDOS_FY,
    INSTALL_SITE_NAME,
    INSTALL_SITE_ADDRESS,
    INSTALL_SITE_CITY,
    INSTALL_SITE_STATE,
    INSTALL_SITE_POSTAL_CODE,
];

pub const READY_RENAMES: &[(&str, &str)] = &[
    (SAV_NAME, ACCOUNT_NAME),
    (PRODUCT_LIST_PRICE, TOTAL_SPEND),
];

pub const SPOT_COLUMNS: &[&str] = &[
    ACCOUNT_NAME,
    TOP_EQUIPMAKE_SHARE,
    TOP_PROVIDER_SHARE,
    OPPTY_SCORE,
    THREAT_SCORE,
    BUDGET_K,
    REMAINING_BUDGET_K,
];

/// Account names containing this marker are Education accounts.
pub const EDUCATION_MARKER: &str = "SCHOOL";

/// Filter sentinel meaning "no filter on this field".
pub const ALL: &str = "All";

pub const DEFAULT_COUNTRY: &str = "US";
pub const DEFAULT_PORT: u16 = 8050;
pub const DEFAULT_CONFIG_FILE: &str = "heatmap.toml";

// Map layout defaults
pub const MAP_ZOOM: u8 = 6;
pub const SPEND_SIZE_MAX: u32 = 25;
pub const SPOT_SIZE_MAX: u32 = 15;
pub const BUBBLE_OPACITY: f64 = 0.5;

/// Account frame columns in export order.
pub const FRAME_COLUMNS: &[&str] = &[
    ACCOUNT_NAME,
    BUSINESS_ENTITY,
    VERTICAL,
    TOTAL_SPEND,
    INSTALL_SITE_POSTAL_CODE,
    TOTAL_SITES,
    TOTAL_LDOS,
    LATITUDE,
    LONGITUDE,
    TOP_EQUIPMAKE_SHARE,
    TOP_PROVIDER_SHARE,
    OPPTY_SCORE,
    THREAT_SCORE,
    BUDGET_K,
    REMAINING_BUDGET_K,
    PRIMARY_VENDOR,
    PRIMARY_VENDOR_SHARE,
    TOP_PARTNER,
    TOP_PARTNER_SHARE,
];

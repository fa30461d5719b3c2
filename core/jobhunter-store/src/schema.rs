//! Table definitions.
//!
//! Money columns hold integer cents, percentage columns hold hundredths of
//! a percent, timestamps are UTC text.

pub(crate) const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS customers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE COLLATE NOCASE,
    password_hash TEXT,
    name TEXT NOT NULL,
    activation_key TEXT UNIQUE,
    extension_activated INTEGER NOT NULL DEFAULT 0,
    extension_usage_count INTEGER NOT NULL DEFAULT 0,
    extension_last_used TEXT,
    trial_jobs_used INTEGER NOT NULL DEFAULT 0,
    trial_limit INTEGER NOT NULL DEFAULT 3,
    is_blocked INTEGER NOT NULL DEFAULT 0,
    blocked_reason TEXT,
    blocked_at TEXT,
    subscription_status TEXT NOT NULL DEFAULT 'inactive',
    total_spent INTEGER NOT NULL DEFAULT 0,
    total_orders INTEGER NOT NULL DEFAULT 0,
    last_order_date TEXT,
    google_id TEXT UNIQUE,
    facebook_id TEXT UNIQUE,
    github_id TEXT UNIQUE,
    avatar TEXT,
    referral_code TEXT UNIQUE,
    referred_by TEXT,
    total_earnings INTEGER NOT NULL DEFAULT 0,
    commission_rate INTEGER NOT NULL DEFAULT 1000,
    preferred_language TEXT NOT NULL DEFAULT 'en',
    marketing_opt_in INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sessions (
    token TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    subject_id INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    last_activity TEXT NOT NULL,
    expires_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS products (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    price INTEGER NOT NULL,
    before_price INTEGER,
    currency TEXT NOT NULL DEFAULT 'eur',
    file_name TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS coupons (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    code TEXT NOT NULL UNIQUE,
    discount_type TEXT NOT NULL,
    discount_value INTEGER NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    usage_limit INTEGER,
    usage_count INTEGER NOT NULL DEFAULT 0,
    expires_at TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS orders (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    customer_id INTEGER REFERENCES customers(id) ON DELETE SET NULL,
    customer_email TEXT NOT NULL,
    customer_name TEXT NOT NULL,
    original_amount INTEGER NOT NULL,
    final_amount INTEGER NOT NULL,
    discount_amount INTEGER NOT NULL DEFAULT 0,
    coupon_code TEXT,
    referral_code TEXT,
    currency TEXT NOT NULL DEFAULT 'usd',
    status TEXT NOT NULL DEFAULT 'pending',
    payment_method TEXT NOT NULL,
    payment_intent_id TEXT UNIQUE,
    paypal_order_id TEXT UNIQUE,
    download_token TEXT NOT NULL UNIQUE,
    download_count INTEGER NOT NULL DEFAULT 0,
    max_downloads INTEGER NOT NULL DEFAULT 3,
    activation_code TEXT,
    created_at TEXT NOT NULL,
    completed_at TEXT
);

CREATE TABLE IF NOT EXISTS activation_codes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    code TEXT NOT NULL UNIQUE,
    customer_id INTEGER REFERENCES customers(id) ON DELETE SET NULL,
    order_id INTEGER REFERENCES orders(id),
    installation_id TEXT,
    version_token TEXT UNIQUE,
    device_id TEXT,
    ip_address TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    is_revoked INTEGER NOT NULL DEFAULT 0,
    activation_count INTEGER NOT NULL DEFAULT 0,
    max_activations INTEGER NOT NULL DEFAULT 1,
    daily_validation_count INTEGER NOT NULL DEFAULT 0,
    last_validation_at TEXT,
    activated_at TEXT,
    expires_at TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_activation_codes_installation
    ON activation_codes(installation_id);

CREATE TABLE IF NOT EXISTS extension_installations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    installation_id TEXT NOT NULL UNIQUE,
    customer_id INTEGER REFERENCES customers(id) ON DELETE SET NULL,
    device_fingerprint TEXT,
    user_agent TEXT,
    ip_address TEXT,
    extension_version TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    last_seen_at TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS premium_devices (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    device_fingerprint TEXT NOT NULL UNIQUE,
    extension_id TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    registered_at TEXT NOT NULL,
    last_seen_at TEXT NOT NULL,
    deactivated_at TEXT,
    deactivation_reason TEXT
);

CREATE TABLE IF NOT EXISTS trial_usage (
    trial_key TEXT PRIMARY KEY,
    extension_id TEXT NOT NULL,
    fingerprint TEXT NOT NULL,
    usage_count INTEGER NOT NULL DEFAULT 0,
    max_uses INTEGER NOT NULL DEFAULT 3,
    is_expired INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    last_used_at TEXT
);

CREATE TABLE IF NOT EXISTS extension_usage_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    customer_id INTEGER NOT NULL REFERENCES customers(id) ON DELETE CASCADE,
    session_id TEXT NOT NULL,
    jobs_used INTEGER NOT NULL DEFAULT 1,
    platform TEXT NOT NULL DEFAULT 'ocus',
    location TEXT,
    extension_version TEXT,
    was_trial INTEGER NOT NULL,
    usage_date TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS affiliate_transactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    affiliate_id INTEGER NOT NULL REFERENCES customers(id) ON DELETE CASCADE,
    order_id INTEGER NOT NULL UNIQUE REFERENCES orders(id),
    commission INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    paid_at TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS affiliate_payouts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    affiliate_id INTEGER NOT NULL REFERENCES customers(id) ON DELETE CASCADE,
    amount INTEGER NOT NULL,
    payment_method TEXT NOT NULL,
    payment_email TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    transaction_id TEXT,
    notes TEXT,
    requested_at TEXT NOT NULL,
    processed_at TEXT,
    paid_at TEXT
);

CREATE TABLE IF NOT EXISTS invoice_settings (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    company_name TEXT NOT NULL,
    company_address TEXT,
    company_phone TEXT,
    company_email TEXT,
    company_website TEXT,
    tax_number TEXT,
    invoice_prefix TEXT NOT NULL,
    receipt_prefix TEXT NOT NULL,
    invoice_notes TEXT,
    terms_and_conditions TEXT,
    footer_text TEXT,
    primary_color TEXT NOT NULL,
    secondary_color TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS invoices (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    invoice_number TEXT NOT NULL UNIQUE,
    order_id INTEGER REFERENCES orders(id),
    customer_id INTEGER REFERENCES customers(id) ON DELETE SET NULL,
    customer_name TEXT NOT NULL,
    customer_email TEXT NOT NULL,
    billing_address TEXT,
    invoice_date TEXT NOT NULL,
    due_date TEXT NOT NULL,
    subtotal INTEGER NOT NULL,
    tax_amount INTEGER NOT NULL DEFAULT 0,
    discount_amount INTEGER NOT NULL DEFAULT 0,
    total_amount INTEGER NOT NULL,
    currency TEXT NOT NULL DEFAULT 'usd',
    status TEXT NOT NULL DEFAULT 'issued',
    paid_at TEXT,
    notes TEXT,
    created_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_invoices_order
    ON invoices(order_id) WHERE order_id IS NOT NULL;

CREATE TABLE IF NOT EXISTS invoice_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    invoice_id INTEGER NOT NULL REFERENCES invoices(id) ON DELETE CASCADE,
    product_name TEXT NOT NULL,
    description TEXT,
    quantity INTEGER NOT NULL DEFAULT 1,
    unit_price INTEGER NOT NULL,
    total_price INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS tickets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    category TEXT NOT NULL DEFAULT 'general',
    priority TEXT NOT NULL DEFAULT 'medium',
    status TEXT NOT NULL DEFAULT 'open',
    customer_email TEXT NOT NULL,
    customer_name TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    resolved_at TEXT
);

CREATE TABLE IF NOT EXISTS ticket_messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ticket_id INTEGER NOT NULL REFERENCES tickets(id) ON DELETE CASCADE,
    message TEXT NOT NULL,
    is_from_customer INTEGER NOT NULL DEFAULT 1,
    sender_name TEXT NOT NULL,
    sender_email TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS dashboard_features (
    feature_name TEXT PRIMARY KEY,
    is_enabled INTEGER NOT NULL DEFAULT 1,
    description TEXT,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS countdown_banners (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    is_enabled INTEGER NOT NULL DEFAULT 1,
    title_en TEXT NOT NULL,
    subtitle_en TEXT NOT NULL,
    title_translations TEXT NOT NULL DEFAULT '{}',
    subtitle_translations TEXT NOT NULL DEFAULT '{}',
    target_price INTEGER NOT NULL,
    original_price INTEGER,
    end_date_time TEXT NOT NULL,
    background_color TEXT NOT NULL DEFAULT 'gradient-primary',
    text_color TEXT NOT NULL DEFAULT 'white',
    priority INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS announcement_badges (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    is_enabled INTEGER NOT NULL DEFAULT 1,
    text_en TEXT NOT NULL,
    text_translations TEXT NOT NULL DEFAULT '{}',
    background_color TEXT NOT NULL DEFAULT 'gradient-primary',
    text_color TEXT NOT NULL DEFAULT 'white',
    priority INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";

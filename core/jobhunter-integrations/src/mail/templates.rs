//! Customer and affiliate notification emails.

use super::{escape_html as esc, Email, SUPPORT_FROM};
use jobhunter_types::{Currency, Money, OrderId, Percent};

/// Minimum payout shown in affiliate emails.
const MINIMUM_PAYOUT: &str = "50.00";

#[derive(Debug, Clone)]
pub struct PurchaseConfirmation {
    pub customer_name: String,
    pub order_id: OrderId,
    pub amount: Money,
    pub currency: Currency,
    pub download_url: String,
    pub max_downloads: u32,
    pub activation_code: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReferralCommission {
    pub affiliate_name: String,
    pub referral_code: String,
    pub customer_email: String,
    pub order_amount: Money,
    pub commission: Money,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct CommissionApproved {
    pub affiliate_name: String,
    pub order_id: OrderId,
    pub commission: Money,
    pub total_earnings: Money,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct PayoutProcessed {
    pub affiliate_name: String,
    pub amount: Money,
    pub payment_method: String,
    pub transaction_id: Option<String>,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct AffiliateWelcome {
    pub name: String,
    pub referral_code: String,
    pub commission_rate: Percent,
    pub base_url: String,
}

fn card(title: &str, color: &str, body: &str) -> String {
    format!(
        "<div style=\"font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; \
         padding: 20px; background-color: #f8f9fa;\">\
         <div style=\"background-color: #ffffff; padding: 30px; border-radius: 10px;\">\
         <h1 style=\"color: {color}; text-align: center; font-size: 26px;\">{title}</h1>\
         {body}\
         <hr style=\"border: none; border-top: 1px solid #eee; margin: 30px 0;\">\
         <p style=\"font-size: 12px; color: #999; text-align: center;\">\
         This is an automated message from OCUS Job Hunter.<br>\
         Questions? Contact us at {SUPPORT_FROM}</p>\
         </div></div>"
    )
}

fn button(href: &str, label: &str) -> String {
    format!(
        "<p style=\"text-align: center; margin: 30px 0;\"><a href=\"{}\" \
         style=\"background-color: #007bff; color: white; padding: 12px 30px; \
         text-decoration: none; border-radius: 5px; font-weight: bold;\">{label}</a></p>",
        esc(href)
    )
}

fn referral_link(base_url: &str, code: &str) -> String {
    format!("{}/?ref={}", base_url.trim_end_matches('/'), code)
}

pub fn purchase_confirmation(to: &str, data: &PurchaseConfirmation) -> Email {
    let activation = data
        .activation_code
        .as_deref()
        .map(|code| {
            format!(
                "<div style=\"background: #F0FDF4; padding: 20px; border-left: 4px solid #10B981;\">\
                 <h3 style=\"margin-top: 0; color: #10B981;\">Your Activation Key</h3>\
                 <p style=\"font-family: monospace; font-size: 16px;\"><strong>{}</strong></p>\
                 <p>After your 3 free uses, open the extension popup, find the \
                 \"License Activation\" section, enter the key and click \
                 \"Activate Extension\".</p></div>",
                esc(code)
            )
        })
        .unwrap_or_default();

    let body = format!(
        "<p>Hi {name},</p>\
         <p>Thank you for purchasing the OCUS Job Hunter Extension! Your payment has been \
         processed successfully. The extension includes 3 free job searches so you can start \
         immediately.</p>\
         {download}\
         {activation}\
         <h3>Order Details</h3>\
         <p><strong>Order ID:</strong> #{order}<br>\
         <strong>Amount:</strong> {amount} {currency}</p>\
         <p>This download link is valid for {max} downloads. Please save the extension file \
         after downloading.</p>",
        name = esc(&data.customer_name),
        download = button(&data.download_url, "Download Extension Files"),
        order = data.order_id,
        amount = data.amount,
        currency = data.currency.upper(),
        max = data.max_downloads,
    );
    Email {
        from: None,
        to: to.to_string(),
        subject: "Your OCUS Job Hunter Extension is Ready - START FREE!".to_string(),
        html: card("Your Extension is Ready!", "#2563EB", &body),
    }
}

pub fn referral_commission(to: &str, data: &ReferralCommission) -> Email {
    let body = format!(
        "<p>Hi {name},</p>\
         <p>Great news! Someone just purchased OCUS Job Hunter using your referral code \
         <strong>{code}</strong>.</p>\
         <ul>\
         <li><strong>Order Amount:</strong> {order}</li>\
         <li><strong>Your Commission:</strong> {commission}</li>\
         <li><strong>Customer:</strong> {customer}</li>\
         </ul>\
         <p>You can request a payout once your earnings reach {MINIMUM_PAYOUT}.</p>\
         {dashboard}\
         <p style=\"font-size: 14px; color: #666;\">Your referral link: {link}</p>",
        name = esc(&data.affiliate_name),
        code = esc(&data.referral_code),
        order = data.order_amount,
        commission = data.commission,
        customer = esc(&data.customer_email),
        dashboard = button(
            &format!("{}/affiliate", data.base_url.trim_end_matches('/')),
            "View Affiliate Dashboard"
        ),
        link = esc(&referral_link(&data.base_url, &data.referral_code)),
    );
    Email {
        from: Some(SUPPORT_FROM.to_string()),
        to: to.to_string(),
        subject: "New Referral Commission Earned!".to_string(),
        html: card("New Commission Earned!", "#28a745", &body),
    }
}

pub fn commission_approved(to: &str, data: &CommissionApproved) -> Email {
    let next_step = if data.total_earnings >= Money::from_cents(5_000) {
        button(
            &format!("{}/affiliate", data.base_url.trim_end_matches('/')),
            "Request Payout Now",
        )
    } else {
        format!(
            "<p>You'll be able to request a payout once your approved earnings reach \
             {MINIMUM_PAYOUT}.</p>"
        )
    };
    let body = format!(
        "<p>Hi {name},</p>\
         <p>Your commission for order #{order} has been approved and is now ready for \
         payout!</p>\
         <ul>\
         <li><strong>Approved Commission:</strong> {commission}</li>\
         <li><strong>Total Earnings:</strong> {total}</li>\
         <li><strong>Minimum Payout:</strong> {MINIMUM_PAYOUT}</li>\
         </ul>\
         {next_step}",
        name = esc(&data.affiliate_name),
        order = data.order_id,
        commission = data.commission,
        total = data.total_earnings,
    );
    Email {
        from: Some(SUPPORT_FROM.to_string()),
        to: to.to_string(),
        subject: "Commission Approved - Ready for Payout!".to_string(),
        html: card("Commission Approved!", "#28a745", &body),
    }
}

pub fn payout_processed(to: &str, data: &PayoutProcessed) -> Email {
    let transaction = data
        .transaction_id
        .as_deref()
        .map(|id| format!("<li><strong>Transaction ID:</strong> {}</li>", esc(id)))
        .unwrap_or_default();
    let arrival = if data.payment_method.eq_ignore_ascii_case("paypal") {
        "The funds should appear in your PayPal account within 24-48 hours."
    } else {
        "The funds should appear in your bank account within 3-5 business days."
    };
    let body = format!(
        "<p>Hi {name},</p>\
         <p>Great news! Your payout request has been processed successfully.</p>\
         <ul>\
         <li><strong>Amount:</strong> {amount}</li>\
         <li><strong>Payment Method:</strong> {method}</li>\
         {transaction}\
         </ul>\
         <p>{arrival}</p>\
         {dashboard}",
        name = esc(&data.affiliate_name),
        amount = data.amount,
        method = esc(&data.payment_method),
        dashboard = button(
            &format!("{}/affiliate", data.base_url.trim_end_matches('/')),
            "View Affiliate Dashboard"
        ),
    );
    Email {
        from: Some(SUPPORT_FROM.to_string()),
        to: to.to_string(),
        subject: "Payout Processed Successfully!".to_string(),
        html: card("Payout Processed!", "#28a745", &body),
    }
}

pub fn affiliate_welcome(to: &str, data: &AffiliateWelcome) -> Email {
    let link = referral_link(&data.base_url, &data.referral_code);
    let body = format!(
        "<p>Hi {name},</p>\
         <p>Welcome to the OCUS Job Hunter affiliate program! You earn {rate}% on every \
         purchase made through your link.</p>\
         <p><strong>Your referral code:</strong> {code}<br>\
         <strong>Your referral link:</strong> {link}</p>\
         <p>Payouts can be requested once your earnings reach {MINIMUM_PAYOUT}.</p>\
         {dashboard}",
        name = esc(&data.name),
        rate = data.commission_rate,
        code = esc(&data.referral_code),
        link = esc(&link),
        dashboard = button(
            &format!("{}/affiliate", data.base_url.trim_end_matches('/')),
            "Open Affiliate Dashboard"
        ),
    );
    Email {
        from: Some(SUPPORT_FROM.to_string()),
        to: to.to_string(),
        subject: "Welcome to the OCUS Job Hunter Affiliate Program".to_string(),
        html: card("Welcome, Affiliate!", "#007bff", &body),
    }
}

//! Figures for the admin dashboard.

use crate::affiliate::{AffiliateOverview, AffiliateService};
use crate::error::CommerceResult;
use jobhunter_store::{Order, Page, Store};
use jobhunter_types::Money;
use serde::Serialize;

const RECENT_ORDERS: u32 = 5;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_revenue: Money,
    pub completed_sales: u64,
    pub pending_orders: u64,
    pub total_customers: u64,
    pub total_orders: u64,
    pub recent_orders: Vec<Order>,
    pub affiliate: AffiliateOverview,
}

#[derive(Clone)]
pub struct AnalyticsService {
    store: Store,
    affiliate: AffiliateService,
}

impl AnalyticsService {
    pub fn new(store: Store, affiliate: AffiliateService) -> Self {
        Self { store, affiliate }
    }

    pub fn dashboard_stats(&self) -> CommerceResult<DashboardStats> {
        let sales = self.store.sales_summary()?;
        let recent = self.store.list_orders(Page {
            limit: RECENT_ORDERS,
            offset: 0,
        })?;
        Ok(DashboardStats {
            total_revenue: sales.total_revenue,
            completed_sales: sales.completed_orders,
            pending_orders: sales.pending_orders,
            total_customers: self.store.count_customers()?,
            total_orders: recent.total,
            recent_orders: recent.orders,
            affiliate: self.affiliate.overview()?,
        })
    }
}

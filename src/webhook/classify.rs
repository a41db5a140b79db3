//! Subscription state classification
//!
//! Maps a provider event `(type, data)` to the subscription state stored in
//! the user's public metadata. Everything here is a pure function of its
//! inputs, so the tables in the tests below describe the whole behaviour.

use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Inactive,
}

/// Subscription status plus plan label, as pushed to the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionState {
    pub status: SubscriptionStatus,
    pub plan: Option<String>,
}

impl SubscriptionState {
    pub fn active(plan: Option<String>) -> Self {
        Self {
            status: SubscriptionStatus::Active,
            plan,
        }
    }

    pub fn inactive() -> Self {
        Self {
            status: SubscriptionStatus::Inactive,
            plan: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Resolved(SubscriptionState),
    Unrecognized,
}

/// How an item on a free (zero-amount) plan counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FreePlanPolicy {
    /// Free plans are real subscriptions: active with the free plan's name.
    #[default]
    Active,
    /// Free plans never make a subscription active.
    Inactive,
}

impl FromStr for FreePlanPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            other => Err(format!("expected `active` or `inactive`, got `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClassificationRules {
    pub free_plan: FreePlanPolicy,
}

/// Event families, decided by the event type alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFamily {
    AccountLifecycle,
    BecomingActive { item_event: bool },
    BecomingInactive,
    Unrecognized,
}

const ACTIVATING_ACTIONS: [&str; 5] = ["created", "updated", "active", "activated", "planChanged"];
const DEACTIVATING_ACTIONS: [&str; 6] = [
    "pastDue",
    "canceled",
    "expired",
    "ended",
    "abandoned",
    "incomplete",
];
const QUALIFYING_ITEM_STATUSES: [&str; 2] = ["active", "trialing"];

pub fn event_family(event_type: &str) -> EventFamily {
    let Some((resource, action)) = event_type.split_once('.') else {
        return EventFamily::Unrecognized;
    };

    match resource {
        "user" if matches!(action, "created" | "deleted") => EventFamily::AccountLifecycle,
        "subscription" | "subscriptionItem" => {
            if ACTIVATING_ACTIONS.contains(&action) {
                EventFamily::BecomingActive {
                    item_event: resource == "subscriptionItem",
                }
            } else if DEACTIVATING_ACTIONS.contains(&action) {
                EventFamily::BecomingInactive
            } else {
                EventFamily::Unrecognized
            }
        }
        _ => EventFamily::Unrecognized,
    }
}

pub fn classify(event_type: &str, data: &Value, rules: &ClassificationRules) -> Classification {
    let state = match event_family(event_type) {
        EventFamily::AccountLifecycle | EventFamily::BecomingInactive => {
            SubscriptionState::inactive()
        }
        EventFamily::BecomingActive { item_event } => {
            active_item(data, item_event, rules)
                .map(|item| SubscriptionState::active(plan_name(item)))
                .unwrap_or_else(SubscriptionState::inactive)
        }
        EventFamily::Unrecognized => return Classification::Unrecognized,
    };
    Classification::Resolved(state)
}

/// Finds the subject user id in `data`, trying known payload shapes in order.
///
/// Account events carry the user itself, so its `id` is the subject. Billing
/// events name the subject through the payer or the parent subscription.
pub fn extract_user_id(event_type: &str, data: &Value) -> Option<String> {
    const BILLING_PATHS: [&[&str]; 4] = [
        &["payer", "user_id"],
        &["user_id"],
        &["subscription", "user_id"],
        &["subscription", "payer", "user_id"],
    ];

    if event_type.starts_with("user.") {
        return non_empty_str(data.get("id"));
    }

    BILLING_PATHS
        .iter()
        .find_map(|path| non_empty_str(lookup(data, path)))
}

fn active_item<'a>(data: &'a Value, item_event: bool, rules: &ClassificationRules) -> Option<&'a Value> {
    let qualifies = |item: &&Value| {
        let status = item.get("status").and_then(Value::as_str).unwrap_or_default();
        QUALIFYING_ITEM_STATUSES.contains(&status)
            && !(rules.free_plan == FreePlanPolicy::Inactive && is_free_plan(item))
    };

    match data.get("items") {
        Some(Value::Array(items)) => items.iter().find(qualifies),
        // Item events carry the item itself as the payload.
        None if item_event => Some(data).filter(qualifies),
        _ => None,
    }
}

fn plan_name(item: &Value) -> Option<String> {
    non_empty_str(lookup(item, &["plan", "name"]))
}

fn is_free_plan(item: &Value) -> bool {
    let Some(plan) = item.get("plan") else {
        return false;
    };

    let zero_amount = [lookup(plan, &["amount"]), lookup(plan, &["fee", "amount"])]
        .into_iter()
        .flatten()
        .any(|amount| amount.as_f64() == Some(0.0));

    let named_free = ["slug", "name"].iter().any(|key| {
        plan.get(*key)
            .and_then(Value::as_str)
            .is_some_and(|label| label.eq_ignore_ascii_case("free"))
    });

    zero_amount || named_free
}

fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.get(*key))
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

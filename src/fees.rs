use std::collections::HashMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::TransferType;

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    AirtelMoney,
    MtnMoney,
    ZamtelKwacha,
    Zanaco,
    Absa,
    Fnb,
    Unknown,
}

impl Provider {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::AirtelMoney => "Airtel Money",
            Self::MtnMoney => "MTN Money",
            Self::ZamtelKwacha => "Zamtel Kwacha",
            Self::Zanaco => "Zanaco",
            Self::Absa => "Absa",
            Self::Fnb => "FNB",
            Self::Unknown => "Unknown",
        }
    }
}

const PROVIDER_KEYWORDS: &[(&str, Provider)] = &[
    ("airtel", Provider::AirtelMoney),
    ("mtn", Provider::MtnMoney),
    ("momo", Provider::MtnMoney),
    ("zamtel", Provider::ZamtelKwacha),
    ("zampay", Provider::ZamtelKwacha),
    ("zanaco", Provider::Zanaco),
    ("absa", Provider::Absa),
    ("fnb", Provider::Fnb),
];

/// Map a sender identifier to its provider by case-insensitive substring
/// match. Unmatched senders map to `Unknown`, which has no fee schedules.
pub fn provider_for_sender(sender: &str) -> Provider {
    let needle = sender.to_lowercase();
    for (keyword, provider) in PROVIDER_KEYWORDS {
        if needle.contains(keyword) {
            return *provider;
        }
    }
    Provider::Unknown
}

// ---------------------------------------------------------------------------
// Phone-prefix inference
// ---------------------------------------------------------------------------

// Zambian mobile-money network codes: 95/75 Zamtel, 96/76 MTN, 97/77 Airtel.
// Numbers appear as 0971234567, 260971234567 or +260971234567.
const PHONE_PATTERN: &str = r"\b(?:\+?260|0)(9[567]|7[567])\d{7}\b";

/// Scan a message body for a recipient mobile number. A number on a
/// mobile-money network implies a bank-to-mobile transfer.
pub fn infer_transfer_type(body: &str) -> Option<TransferType> {
    let Ok(re) = Regex::new(PHONE_PATTERN) else {
        return None;
    };
    re.is_match(body).then_some(TransferType::ToMobile)
}

// ---------------------------------------------------------------------------
// Fee schedules
// ---------------------------------------------------------------------------

/// One amount tier: half-open-above interval (min, max] mapped to a flat fee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeTier {
    pub min: f64,
    pub max: f64,
    pub fee: f64,
}

/// Tier table for one (provider, transfer type) pair. An empty tier list
/// means the transfer type is known to be fee-free.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub payee: String,
    pub category: String,
    pub tiers: Vec<FeeTier>,
}

/// Flat per-message charge some providers levy just for sending the alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationFee {
    pub fee: f64,
    pub payee: String,
    pub category: String,
}

/// Fixed placeholder for providers whose messages never state a transfer
/// type. Posted with a memo flagging it as an estimate to correct by hand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatedFee {
    pub fee: f64,
    pub payee: String,
    pub category: String,
}

/// Result of a fee lookup. "Not configured" and "fee is zero" are distinct
/// states, as are "configured but the amount is outside every tier".
#[derive(Debug, Clone, PartialEq)]
pub enum FeeQuote {
    Unconfigured,
    Free,
    OutOfRange,
    Flat {
        fee: f64,
        payee: String,
        category: String,
    },
}

/// Immutable fee tables, built once at startup from configuration. The
/// shipped defaults cover the Zambian providers and can be edited in the
/// settings file without touching the lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeConfig {
    #[serde(default)]
    pub transfer: HashMap<Provider, HashMap<TransferType, FeeSchedule>>,
    #[serde(default)]
    pub notification: HashMap<Provider, NotificationFee>,
    #[serde(default)]
    pub estimated: HashMap<Provider, EstimatedFee>,
}

impl FeeConfig {
    pub fn transfer_fee(
        &self,
        provider: Provider,
        transfer_type: TransferType,
        amount: f64,
    ) -> FeeQuote {
        let Some(schedule) = self
            .transfer
            .get(&provider)
            .and_then(|by_type| by_type.get(&transfer_type))
        else {
            return FeeQuote::Unconfigured;
        };
        if schedule.tiers.is_empty() {
            return FeeQuote::Free;
        }
        for tier in &schedule.tiers {
            if amount > tier.min && amount <= tier.max {
                return FeeQuote::Flat {
                    fee: tier.fee,
                    payee: schedule.payee.clone(),
                    category: schedule.category.clone(),
                };
            }
        }
        // Outside every tier. Never default to zero or to the nearest tier.
        FeeQuote::OutOfRange
    }

    pub fn notification_fee(&self, provider: Provider) -> FeeQuote {
        match self.notification.get(&provider) {
            Some(n) => FeeQuote::Flat {
                fee: n.fee,
                payee: n.payee.clone(),
                category: n.category.clone(),
            },
            None => FeeQuote::Unconfigured,
        }
    }

    pub fn estimated_fee(&self, provider: Provider) -> Option<&EstimatedFee> {
        self.estimated.get(&provider)
    }

    // -- shipped defaults ---------------------------------------------------

    pub fn zambian_defaults() -> Self {
        let mut transfer: HashMap<Provider, HashMap<TransferType, FeeSchedule>> = HashMap::new();

        transfer.insert(
            Provider::AirtelMoney,
            wallet_schedules(
                "Airtel Money",
                &[
                    (0.0, 150.0, 0.58),
                    (150.0, 300.0, 1.10),
                    (300.0, 500.0, 1.75),
                    (500.0, 1000.0, 3.50),
                    (1000.0, 3000.0, 5.80),
                    (3000.0, 5000.0, 8.50),
                    (5000.0, 10000.0, 12.00),
                ],
                &[
                    (0.0, 150.0, 1.50),
                    (150.0, 300.0, 2.50),
                    (300.0, 500.0, 4.00),
                    (500.0, 1000.0, 6.50),
                    (1000.0, 3000.0, 10.00),
                    (3000.0, 5000.0, 14.00),
                    (5000.0, 10000.0, 18.00),
                ],
                &[
                    (0.0, 500.0, 4.00),
                    (500.0, 1000.0, 7.00),
                    (1000.0, 3000.0, 11.00),
                    (3000.0, 10000.0, 15.00),
                ],
                &[
                    (0.0, 150.0, 2.00),
                    (150.0, 300.0, 3.50),
                    (300.0, 500.0, 5.00),
                    (500.0, 1000.0, 8.00),
                    (1000.0, 3000.0, 12.50),
                    (3000.0, 5000.0, 17.00),
                    (5000.0, 10000.0, 25.00),
                ],
            ),
        );

        transfer.insert(
            Provider::MtnMoney,
            wallet_schedules(
                "MTN Money",
                &[
                    (0.0, 150.0, 0.70),
                    (150.0, 300.0, 1.30),
                    (300.0, 500.0, 2.00),
                    (500.0, 1000.0, 3.80),
                    (1000.0, 3000.0, 6.00),
                    (3000.0, 5000.0, 9.00),
                    (5000.0, 10000.0, 12.50),
                ],
                &[
                    (0.0, 150.0, 1.70),
                    (150.0, 300.0, 2.80),
                    (300.0, 500.0, 4.20),
                    (500.0, 1000.0, 7.00),
                    (1000.0, 3000.0, 10.50),
                    (3000.0, 5000.0, 15.00),
                    (5000.0, 10000.0, 19.00),
                ],
                &[
                    (0.0, 500.0, 4.50),
                    (500.0, 1000.0, 7.50),
                    (1000.0, 3000.0, 11.50),
                    (3000.0, 10000.0, 16.00),
                ],
                &[
                    (0.0, 150.0, 2.20),
                    (150.0, 300.0, 4.00),
                    (300.0, 500.0, 5.50),
                    (500.0, 1000.0, 9.00),
                    (1000.0, 3000.0, 13.50),
                    (3000.0, 5000.0, 18.00),
                    (5000.0, 10000.0, 27.00),
                ],
            ),
        );

        transfer.insert(
            Provider::ZamtelKwacha,
            wallet_schedules(
                "Zamtel Kwacha",
                &[
                    (0.0, 150.0, 0.50),
                    (150.0, 300.0, 1.00),
                    (300.0, 500.0, 1.60),
                    (500.0, 1000.0, 3.20),
                    (1000.0, 3000.0, 5.50),
                    (3000.0, 5000.0, 8.00),
                    (5000.0, 10000.0, 11.00),
                ],
                &[
                    (0.0, 150.0, 1.40),
                    (150.0, 300.0, 2.30),
                    (300.0, 500.0, 3.80),
                    (500.0, 1000.0, 6.00),
                    (1000.0, 3000.0, 9.50),
                    (3000.0, 5000.0, 13.00),
                    (5000.0, 10000.0, 17.00),
                ],
                &[
                    (0.0, 500.0, 3.80),
                    (500.0, 1000.0, 6.50),
                    (1000.0, 3000.0, 10.50),
                    (3000.0, 10000.0, 14.50),
                ],
                &[
                    (0.0, 150.0, 1.80),
                    (150.0, 300.0, 3.20),
                    (300.0, 500.0, 4.70),
                    (500.0, 1000.0, 7.50),
                    (1000.0, 3000.0, 12.00),
                    (3000.0, 5000.0, 16.00),
                    (5000.0, 10000.0, 23.00),
                ],
            ),
        );

        transfer.insert(
            Provider::Zanaco,
            bank_schedules(
                "Zanaco",
                &[
                    (0.0, 1000.0, 5.00),
                    (1000.0, 5000.0, 10.00),
                    (5000.0, 20000.0, 15.00),
                ],
                &[(0.0, 5000.0, 8.00), (5000.0, 50000.0, 20.00)],
            ),
        );

        transfer.insert(
            Provider::Absa,
            bank_schedules(
                "Absa",
                &[
                    (0.0, 1000.0, 6.00),
                    (1000.0, 5000.0, 12.00),
                    (5000.0, 20000.0, 18.00),
                ],
                &[(0.0, 5000.0, 9.00), (5000.0, 50000.0, 22.00)],
            ),
        );

        let mut notification = HashMap::new();
        notification.insert(
            Provider::Zanaco,
            NotificationFee {
                fee: 1.20,
                payee: "Zanaco".to_string(),
                category: BANK_CHARGES.to_string(),
            },
        );
        notification.insert(
            Provider::Absa,
            NotificationFee {
                fee: 1.00,
                payee: "Absa".to_string(),
                category: BANK_CHARGES.to_string(),
            },
        );
        notification.insert(
            Provider::Fnb,
            NotificationFee {
                fee: 0.90,
                payee: "FNB".to_string(),
                category: BANK_CHARGES.to_string(),
            },
        );

        // FNB alerts never say what kind of transfer happened, so outflows
        // get a fixed estimate pending manual correction.
        let mut estimated = HashMap::new();
        estimated.insert(
            Provider::Fnb,
            EstimatedFee {
                fee: 2.50,
                payee: "FNB".to_string(),
                category: BANK_CHARGES.to_string(),
            },
        );

        Self {
            transfer,
            notification,
            estimated,
        }
    }
}

const TRANSACTION_FEES: &str = "Transaction Fees";
const BANK_CHARGES: &str = "Bank Charges";

fn tiers(table: &[(f64, f64, f64)]) -> Vec<FeeTier> {
    table
        .iter()
        .map(|&(min, max, fee)| FeeTier { min, max, fee })
        .collect()
}

fn schedule(payee: &str, category: &str, table: &[(f64, f64, f64)]) -> FeeSchedule {
    FeeSchedule {
        payee: payee.to_string(),
        category: category.to_string(),
        tiers: tiers(table),
    }
}

/// Mobile wallets: tiered same-network, cross-network, to-bank and agent
/// withdrawal fees; airtime and bill payments are free.
fn wallet_schedules(
    payee: &str,
    same_network: &[(f64, f64, f64)],
    cross_network: &[(f64, f64, f64)],
    to_bank: &[(f64, f64, f64)],
    withdrawal: &[(f64, f64, f64)],
) -> HashMap<TransferType, FeeSchedule> {
    let mut by_type = HashMap::new();
    by_type.insert(
        TransferType::SameNetwork,
        schedule(payee, TRANSACTION_FEES, same_network),
    );
    by_type.insert(
        TransferType::CrossNetwork,
        schedule(payee, TRANSACTION_FEES, cross_network),
    );
    by_type.insert(
        TransferType::ToBank,
        schedule(payee, TRANSACTION_FEES, to_bank),
    );
    by_type.insert(
        TransferType::Withdrawal,
        schedule(payee, TRANSACTION_FEES, withdrawal),
    );
    by_type.insert(TransferType::Airtime, schedule(payee, TRANSACTION_FEES, &[]));
    by_type.insert(
        TransferType::BillPayment,
        schedule(payee, TRANSACTION_FEES, &[]),
    );
    by_type
}

fn bank_schedules(
    payee: &str,
    to_mobile: &[(f64, f64, f64)],
    to_bank: &[(f64, f64, f64)],
) -> HashMap<TransferType, FeeSchedule> {
    let mut by_type = HashMap::new();
    by_type.insert(
        TransferType::ToMobile,
        schedule(payee, BANK_CHARGES, to_mobile),
    );
    by_type.insert(TransferType::ToBank, schedule(payee, BANK_CHARGES, to_bank));
    by_type
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_for_sender() {
        assert_eq!(provider_for_sender("AirtelMoney"), Provider::AirtelMoney);
        assert_eq!(provider_for_sender("MTNMobileMoney"), Provider::MtnMoney);
        assert_eq!(provider_for_sender("zamtel"), Provider::ZamtelKwacha);
        assert_eq!(provider_for_sender("ZANACO"), Provider::Zanaco);
        assert_eq!(provider_for_sender("2697"), Provider::Unknown);
        assert_eq!(provider_for_sender("Betway"), Provider::Unknown);
    }

    #[test]
    fn test_tier_upper_bound_is_inclusive() {
        let fees = FeeConfig::zambian_defaults();
        let at_boundary =
            fees.transfer_fee(Provider::AirtelMoney, TransferType::SameNetwork, 150.0);
        assert!(matches!(at_boundary, FeeQuote::Flat { fee, .. } if fee == 0.58));
        let above_boundary =
            fees.transfer_fee(Provider::AirtelMoney, TransferType::SameNetwork, 150.01);
        assert!(matches!(above_boundary, FeeQuote::Flat { fee, .. } if fee == 1.10));
    }

    #[test]
    fn test_amount_outside_all_tiers() {
        let fees = FeeConfig::zambian_defaults();
        assert_eq!(
            fees.transfer_fee(Provider::AirtelMoney, TransferType::SameNetwork, 0.0),
            FeeQuote::OutOfRange
        );
        assert_eq!(
            fees.transfer_fee(Provider::AirtelMoney, TransferType::SameNetwork, -5.0),
            FeeQuote::OutOfRange
        );
        assert_eq!(
            fees.transfer_fee(Provider::AirtelMoney, TransferType::SameNetwork, 50000.0),
            FeeQuote::OutOfRange
        );
    }

    #[test]
    fn test_free_vs_unconfigured() {
        let fees = FeeConfig::zambian_defaults();
        // Airtime has an explicit empty tier list: known to be free.
        assert_eq!(
            fees.transfer_fee(Provider::AirtelMoney, TransferType::Airtime, 50.0),
            FeeQuote::Free
        );
        // Wallets have no point-of-sale schedule at all.
        assert_eq!(
            fees.transfer_fee(Provider::AirtelMoney, TransferType::PointOfSale, 50.0),
            FeeQuote::Unconfigured
        );
        // The unknown provider has nothing.
        assert_eq!(
            fees.transfer_fee(Provider::Unknown, TransferType::SameNetwork, 50.0),
            FeeQuote::Unconfigured
        );
    }

    #[test]
    fn test_notification_fee_configured_per_provider() {
        let fees = FeeConfig::zambian_defaults();
        assert!(matches!(
            fees.notification_fee(Provider::Zanaco),
            FeeQuote::Flat { fee, .. } if fee == 1.20
        ));
        assert_eq!(
            fees.notification_fee(Provider::AirtelMoney),
            FeeQuote::Unconfigured
        );
    }

    #[test]
    fn test_estimated_fee_policy_list() {
        let fees = FeeConfig::zambian_defaults();
        assert!(fees.estimated_fee(Provider::Fnb).is_some());
        assert!(fees.estimated_fee(Provider::Zanaco).is_none());
    }

    #[test]
    fn test_infer_transfer_type_from_phone() {
        assert_eq!(
            infer_transfer_type("Sent to 0951234567 ref 8821"),
            Some(TransferType::ToMobile)
        );
        assert_eq!(
            infer_transfer_type("Sent to +260971234567"),
            Some(TransferType::ToMobile)
        );
        assert_eq!(
            infer_transfer_type("Sent to 260761234567"),
            Some(TransferType::ToMobile)
        );
        // Landline-looking and short numbers do not match.
        assert_eq!(infer_transfer_type("Sent to 0211123456"), None);
        assert_eq!(infer_transfer_type("Ref 0976 approved"), None);
        assert_eq!(infer_transfer_type("no number here"), None);
    }

    #[test]
    fn test_fee_config_survives_json_round_trip() {
        let fees = FeeConfig::zambian_defaults();
        let json = serde_json::to_string(&fees).unwrap();
        let back: FeeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(
            back.transfer_fee(Provider::AirtelMoney, TransferType::SameNetwork, 100.0),
            fees.transfer_fee(Provider::AirtelMoney, TransferType::SameNetwork, 100.0)
        );
    }
}

//! Resolution of a split strategy into per-member shares

use bigdecimal::{BigDecimal, Zero};
use log::debug;
use std::collections::{BTreeMap, HashSet};

use super::allocation::{largest_remainder, split_evenly};
use super::{SplitEffect, SplitError};
use crate::money::{check_decimal_bounds, Money};
use crate::types::*;

/// Percentages may be off from 100 by at most this much (0.01)
pub fn percentage_tolerance() -> BigDecimal {
    BigDecimal::new(1.into(), 2)
}

/// Outcome of resolving a split against a group
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSplit {
    pub split_type: SplitType,
    /// Absolute amounts to persist; percentage and custom splits only
    pub split_details: Option<BTreeMap<MemberId, Money>>,
    pub recipient_id: Option<MemberId>,
    /// Equal split participants in group order
    pub participants: Vec<MemberId>,
    /// What each member owes for this transaction, payer included
    pub shares: BTreeMap<MemberId, Money>,
}

impl ResolvedSplit {
    /// Balance effect of the resolved split for the given payer
    pub fn effect(&self, payer_id: &str) -> SplitEffect {
        SplitEffect::new(payer_id.to_string(), self.shares.clone())
    }
}

/// Validates a split against a group and computes each member's share
pub struct SplitResolver<'a> {
    group: &'a Group,
}

impl<'a> SplitResolver<'a> {
    pub fn new(group: &'a Group) -> Self {
        Self { group }
    }

    /// Resolve `split` for `amount` paid by `payer_id`
    pub fn resolve(
        &self,
        amount: Money,
        payer_id: &str,
        split: &SplitSpec,
    ) -> Result<ResolvedSplit, SplitError> {
        if !amount.is_positive() {
            return Err(SplitError::NonPositiveAmount(amount));
        }
        if !self.group.has_member(payer_id) {
            return Err(SplitError::PayerNotInGroup(payer_id.to_string()));
        }

        let resolved = match split {
            SplitSpec::Equal { participants } => self.resolve_equal(amount, participants.as_deref())?,
            SplitSpec::Percentage(percentages) => self.resolve_percentage(amount, percentages)?,
            SplitSpec::Custom(amounts) => self.resolve_custom(amount, amounts)?,
            SplitSpec::Payment { recipient_id } => {
                self.resolve_payment(amount, payer_id, recipient_id)?
            }
        };

        debug!(
            "Resolved {} split of {} in group {} into {} shares",
            resolved.split_type,
            amount,
            self.group.id,
            resolved.shares.len()
        );
        Ok(resolved)
    }

    fn resolve_equal(
        &self,
        amount: Money,
        participants: Option<&[MemberId]>,
    ) -> Result<ResolvedSplit, SplitError> {
        let participants = match participants {
            None => self.group.members.clone(),
            Some(requested) => self.order_participants(requested)?,
        };

        let parts = split_evenly(amount.minor_units(), participants.len());
        let shares = participants
            .iter()
            .cloned()
            .zip(parts.into_iter().map(Money::from_minor_units))
            .collect();

        Ok(ResolvedSplit {
            split_type: SplitType::Equal,
            split_details: None,
            recipient_id: None,
            participants,
            shares,
        })
    }

    /// Checks an explicit participant list and returns it in group order
    fn order_participants(&self, requested: &[MemberId]) -> Result<Vec<MemberId>, SplitError> {
        if requested.is_empty() {
            return Err(SplitError::NoParticipants);
        }
        let mut seen = HashSet::new();
        for member in requested {
            if !self.group.has_member(member) {
                return Err(SplitError::UnknownMember(member.clone()));
            }
            if !seen.insert(member.as_str()) {
                return Err(SplitError::DuplicateParticipant(member.clone()));
            }
        }
        Ok(self
            .group
            .members
            .iter()
            .filter(|m| seen.contains(m.as_str()))
            .cloned()
            .collect())
    }

    fn resolve_percentage(
        &self,
        amount: Money,
        percentages: &BTreeMap<MemberId, BigDecimal>,
    ) -> Result<ResolvedSplit, SplitError> {
        self.check_members(percentages.keys())?;
        for (member, pct) in percentages {
            if check_decimal_bounds(pct).is_err() {
                return Err(SplitError::PercentageOutOfBounds(member.clone()));
            }
            if *pct < BigDecimal::zero() {
                return Err(SplitError::NegativeShare(member.clone()));
            }
        }

        let total: BigDecimal = percentages.values().sum();
        if (&total - BigDecimal::from(100)).abs() > percentage_tolerance() {
            return Err(SplitError::PercentageTotal(total));
        }

        // Group order decides ties when distributing the leftover cents.
        let (members, weights): (Vec<&MemberId>, Vec<BigDecimal>) = self
            .group
            .members
            .iter()
            .filter_map(|m| percentages.get(m).map(|pct| (m, pct.clone())))
            .filter(|(_, pct)| *pct > BigDecimal::zero())
            .unzip();

        let parts = largest_remainder(amount.minor_units(), &weights);
        let details: BTreeMap<MemberId, Money> = members
            .into_iter()
            .zip(parts)
            .filter(|(_, cents)| *cents != 0)
            .map(|(m, cents)| (m.clone(), Money::from_minor_units(cents)))
            .collect();

        Ok(ResolvedSplit {
            split_type: SplitType::Percentage,
            shares: details.clone(),
            split_details: Some(details),
            recipient_id: None,
            participants: Vec::new(),
        })
    }

    fn resolve_custom(
        &self,
        amount: Money,
        amounts: &BTreeMap<MemberId, Money>,
    ) -> Result<ResolvedSplit, SplitError> {
        self.check_members(amounts.keys())?;
        for (member, share) in amounts {
            if share.is_negative() {
                return Err(SplitError::NegativeShare(member.clone()));
            }
        }

        let total = Money::checked_sum(amounts.values()).ok_or(SplitError::AmountOverflow)?;
        if total != amount {
            return Err(SplitError::CustomSplitTotal {
                expected: amount,
                actual: total,
            });
        }

        let details: BTreeMap<MemberId, Money> = amounts
            .iter()
            .filter(|(_, share)| !share.is_zero())
            .map(|(m, share)| (m.clone(), *share))
            .collect();

        Ok(ResolvedSplit {
            split_type: SplitType::Custom,
            shares: details.clone(),
            split_details: Some(details),
            recipient_id: None,
            participants: Vec::new(),
        })
    }

    fn resolve_payment(
        &self,
        amount: Money,
        payer_id: &str,
        recipient_id: &str,
    ) -> Result<ResolvedSplit, SplitError> {
        if !self.group.has_member(recipient_id) {
            return Err(SplitError::RecipientNotInGroup(recipient_id.to_string()));
        }
        if recipient_id == payer_id {
            return Err(SplitError::SelfPayment);
        }

        let mut shares = BTreeMap::new();
        shares.insert(recipient_id.to_string(), amount);

        Ok(ResolvedSplit {
            split_type: SplitType::Payment,
            split_details: None,
            recipient_id: Some(recipient_id.to_string()),
            participants: Vec::new(),
            shares,
        })
    }

    fn check_members<'m>(
        &self,
        mut members: impl Iterator<Item = &'m MemberId>,
    ) -> Result<(), SplitError> {
        match members.find(|m| !self.group.has_member(m)) {
            Some(unknown) => Err(SplitError::UnknownMember(unknown.clone())),
            None => Ok(()),
        }
    }
}

/// Rebuild the balance effect of a stored transaction
pub fn effect_of(transaction: &Transaction) -> SplitEffect {
    let shares = match transaction.split_type {
        SplitType::Equal => {
            let parts = split_evenly(
                transaction.amount.minor_units(),
                transaction.participants.len(),
            );
            transaction
                .participants
                .iter()
                .cloned()
                .zip(parts.into_iter().map(Money::from_minor_units))
                .collect()
        }
        SplitType::Percentage | SplitType::Custom => {
            transaction.split_details.clone().unwrap_or_default()
        }
        SplitType::Payment => transaction
            .recipient_id
            .iter()
            .map(|r| (r.clone(), transaction.amount))
            .collect(),
    };
    SplitEffect::new(transaction.payer_id.clone(), shares)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn group(members: &[&str]) -> Group {
        Group::new(
            "Trip".to_string(),
            members.iter().map(|m| m.to_string()).collect(),
        )
    }

    fn eur(s: &str) -> Money {
        Money::from_str(s).unwrap()
    }

    fn pct(entries: &[(&str, &str)]) -> BTreeMap<MemberId, BigDecimal> {
        entries
            .iter()
            .map(|(m, p)| (m.to_string(), BigDecimal::from_str(p).unwrap()))
            .collect()
    }

    fn amounts(entries: &[(&str, &str)]) -> BTreeMap<MemberId, Money> {
        entries
            .iter()
            .map(|(m, a)| (m.to_string(), eur(a)))
            .collect()
    }

    #[test]
    fn test_equal_split_even_amount() {
        let g = group(&["A", "B", "C"]);
        let resolved = SplitResolver::new(&g)
            .resolve(eur("30.00"), "A", &SplitSpec::Equal { participants: None })
            .unwrap();

        assert_eq!(resolved.shares["A"], eur("10.00"));
        assert_eq!(resolved.shares["B"], eur("10.00"));
        assert_eq!(resolved.shares["C"], eur("10.00"));
        assert_eq!(resolved.participants, vec!["A", "B", "C"]);
        assert!(resolved.split_details.is_none());
    }

    #[test]
    fn test_equal_split_remainder_to_first_members() {
        let g = group(&["A", "B", "C"]);
        let resolved = SplitResolver::new(&g)
            .resolve(eur("10.01"), "A", &SplitSpec::Equal { participants: None })
            .unwrap();

        assert_eq!(resolved.shares["A"], eur("3.34"));
        assert_eq!(resolved.shares["B"], eur("3.34"));
        assert_eq!(resolved.shares["C"], eur("3.33"));
    }

    #[test]
    fn test_equal_split_remainder_follows_group_order_not_id_order() {
        let g = group(&["zoe", "adam", "mia"]);
        let resolved = SplitResolver::new(&g)
            .resolve(eur("0.02"), "zoe", &SplitSpec::Equal { participants: None })
            .unwrap();

        assert_eq!(resolved.shares["zoe"], eur("0.01"));
        assert_eq!(resolved.shares["adam"], eur("0.01"));
        assert_eq!(resolved.shares["mia"], eur("0.00"));
    }

    #[test]
    fn test_equal_split_sums_exactly_for_many_sizes() {
        let names: Vec<String> = (0..25).map(|i| format!("m{:02}", i)).collect();
        for n in 2..=names.len() {
            let refs: Vec<&str> = names[..n].iter().map(String::as_str).collect();
            let g = group(&refs);
            for amount in ["0.01", "10.01", "99.99", "1234.57"] {
                let resolved = SplitResolver::new(&g)
                    .resolve(eur(amount), "m00", &SplitSpec::Equal { participants: None })
                    .unwrap();
                let total: Money = resolved.shares.values().sum();
                assert_eq!(total, eur(amount), "{} members, {}", n, amount);
            }
        }
    }

    #[test]
    fn test_equal_split_with_explicit_participants_is_reordered() {
        let g = group(&["A", "B", "C", "D"]);
        let split = SplitSpec::Equal {
            participants: Some(vec!["D".to_string(), "B".to_string()]),
        };
        let resolved = SplitResolver::new(&g).resolve(eur("0.03"), "A", &split).unwrap();

        assert_eq!(resolved.participants, vec!["B", "D"]);
        assert_eq!(resolved.shares["B"], eur("0.02"));
        assert_eq!(resolved.shares["D"], eur("0.01"));
        assert!(!resolved.shares.contains_key("A"));
    }

    #[test]
    fn test_equal_split_participant_errors() {
        let g = group(&["A", "B"]);
        let resolver = SplitResolver::new(&g);

        let empty = SplitSpec::Equal {
            participants: Some(vec![]),
        };
        assert_eq!(
            resolver.resolve(eur("1.00"), "A", &empty),
            Err(SplitError::NoParticipants)
        );

        let duplicate = SplitSpec::Equal {
            participants: Some(vec!["A".to_string(), "A".to_string()]),
        };
        assert_eq!(
            resolver.resolve(eur("1.00"), "A", &duplicate),
            Err(SplitError::DuplicateParticipant("A".to_string()))
        );

        let stranger = SplitSpec::Equal {
            participants: Some(vec!["X".to_string()]),
        };
        assert_eq!(
            resolver.resolve(eur("1.00"), "A", &stranger),
            Err(SplitError::UnknownMember("X".to_string()))
        );
    }

    #[test]
    fn test_percentage_split_converts_to_amounts() {
        let g = group(&["A", "B", "C"]);
        let split = SplitSpec::Percentage(pct(&[("A", "50"), ("B", "30"), ("C", "20")]));
        let resolved = SplitResolver::new(&g).resolve(eur("80.00"), "A", &split).unwrap();

        let details = resolved.split_details.unwrap();
        assert_eq!(details["A"], eur("40.00"));
        assert_eq!(details["B"], eur("24.00"));
        assert_eq!(details["C"], eur("16.00"));
    }

    #[test]
    fn test_percentage_split_rounding_sums_to_amount() {
        let g = group(&["A", "B", "C"]);
        let split = SplitSpec::Percentage(pct(&[("A", "33.33"), ("B", "33.33"), ("C", "33.34")]));
        let resolved = SplitResolver::new(&g).resolve(eur("10.00"), "B", &split).unwrap();

        let details = resolved.split_details.unwrap();
        assert_eq!(details["A"], eur("3.33"));
        assert_eq!(details["B"], eur("3.33"));
        assert_eq!(details["C"], eur("3.34"));
        assert_eq!(details.values().sum::<Money>(), eur("10.00"));
    }

    #[test]
    fn test_percentage_split_accepts_total_within_tolerance() {
        let g = group(&["A", "B", "C"]);
        let split = SplitSpec::Percentage(pct(&[("A", "33.33"), ("B", "33.33"), ("C", "33.33")]));
        let resolved = SplitResolver::new(&g).resolve(eur("10.01"), "A", &split).unwrap();

        let details = resolved.split_details.unwrap();
        assert_eq!(details.values().sum::<Money>(), eur("10.01"));
        assert_eq!(details["A"], eur("3.34"));
    }

    #[test]
    fn test_percentage_split_rejects_bad_total() {
        let g = group(&["A", "B"]);
        let split = SplitSpec::Percentage(pct(&[("A", "50"), ("B", "49.98")]));
        let err = SplitResolver::new(&g).resolve(eur("10.00"), "A", &split).unwrap_err();
        assert_eq!(
            err,
            SplitError::PercentageTotal(BigDecimal::from_str("99.98").unwrap())
        );
    }

    #[test]
    fn test_percentage_split_omits_zero_members() {
        let g = group(&["A", "B", "C"]);
        let split = SplitSpec::Percentage(pct(&[("A", "0"), ("B", "100")]));
        let resolved = SplitResolver::new(&g).resolve(eur("12.00"), "A", &split).unwrap();

        let details = resolved.split_details.unwrap();
        assert_eq!(details.len(), 1);
        assert_eq!(details["B"], eur("12.00"));
    }

    #[test]
    fn test_percentage_split_rejects_negative_and_unknown() {
        let g = group(&["A", "B"]);
        let resolver = SplitResolver::new(&g);

        let negative = SplitSpec::Percentage(pct(&[("A", "110"), ("B", "-10")]));
        assert_eq!(
            resolver.resolve(eur("10.00"), "A", &negative),
            Err(SplitError::NegativeShare("B".to_string()))
        );

        let unknown = SplitSpec::Percentage(pct(&[("A", "50"), ("Z", "50")]));
        assert_eq!(
            resolver.resolve(eur("10.00"), "A", &unknown),
            Err(SplitError::UnknownMember("Z".to_string()))
        );
    }

    #[test]
    fn test_custom_split_exact_total() {
        let g = group(&["A", "B", "C"]);
        let split = SplitSpec::Custom(amounts(&[("A", "5.00"), ("B", "15.50"), ("C", "0")]));
        let resolved = SplitResolver::new(&g).resolve(eur("20.50"), "C", &split).unwrap();

        let details = resolved.split_details.unwrap();
        assert_eq!(details.len(), 2);
        assert_eq!(details["B"], eur("15.50"));
        assert!(!details.contains_key("C"));
    }

    #[test]
    fn test_custom_split_rejects_mismatched_total() {
        let g = group(&["A", "B"]);
        let split = SplitSpec::Custom(amounts(&[("A", "5.00"), ("B", "4.99")]));
        let err = SplitResolver::new(&g).resolve(eur("10.00"), "A", &split).unwrap_err();
        assert_eq!(
            err,
            SplitError::CustomSplitTotal {
                expected: eur("10.00"),
                actual: eur("9.99"),
            }
        );
    }

    #[test]
    fn test_custom_split_rejects_negative_share() {
        let g = group(&["A", "B"]);
        let split = SplitSpec::Custom(amounts(&[("A", "15.00"), ("B", "-5.00")]));
        assert_eq!(
            SplitResolver::new(&g).resolve(eur("10.00"), "A", &split),
            Err(SplitError::NegativeShare("B".to_string()))
        );
    }

    #[test]
    fn test_custom_split_with_overflowing_shares() {
        let g = group(&["A", "B"]);
        let mut huge = BTreeMap::new();
        huge.insert("A".to_string(), Money::from_minor_units(i64::MAX));
        huge.insert("B".to_string(), Money::from_minor_units(i64::MAX));
        assert_eq!(
            SplitResolver::new(&g).resolve(eur("1.00"), "A", &SplitSpec::Custom(huge)),
            Err(SplitError::AmountOverflow)
        );
    }

    #[test]
    fn test_percentage_split_rejects_unbounded_percentages() {
        let g = group(&["A", "B"]);
        let resolver = SplitResolver::new(&g);

        let huge = SplitSpec::Percentage(pct(&[("A", "1e2000000")]));
        assert_eq!(
            resolver.resolve(eur("1.00"), "A", &huge),
            Err(SplitError::PercentageOutOfBounds("A".to_string()))
        );

        let tiny = SplitSpec::Percentage(pct(&[("A", "100"), ("B", "1e-99999999")]));
        assert_eq!(
            resolver.resolve(eur("1.00"), "A", &tiny),
            Err(SplitError::PercentageOutOfBounds("B".to_string()))
        );
    }

    #[test]
    fn test_payment_resolves_to_recipient_share() {
        let g = group(&["A", "B"]);
        let split = SplitSpec::Payment {
            recipient_id: "B".to_string(),
        };
        let resolved = SplitResolver::new(&g).resolve(eur("20.00"), "A", &split).unwrap();

        assert_eq!(resolved.recipient_id.as_deref(), Some("B"));
        assert!(resolved.split_details.is_none());
        assert_eq!(resolved.shares.len(), 1);
        assert_eq!(resolved.shares["B"], eur("20.00"));
    }

    #[test]
    fn test_payment_errors() {
        let g = group(&["A", "B"]);
        let resolver = SplitResolver::new(&g);

        let to_self = SplitSpec::Payment {
            recipient_id: "A".to_string(),
        };
        assert_eq!(
            resolver.resolve(eur("20.00"), "A", &to_self),
            Err(SplitError::SelfPayment)
        );

        let to_stranger = SplitSpec::Payment {
            recipient_id: "Z".to_string(),
        };
        assert_eq!(
            resolver.resolve(eur("20.00"), "A", &to_stranger),
            Err(SplitError::RecipientNotInGroup("Z".to_string()))
        );
    }

    #[test]
    fn test_common_errors() {
        let g = group(&["A", "B"]);
        let resolver = SplitResolver::new(&g);
        let equal = SplitSpec::Equal { participants: None };

        assert_eq!(
            resolver.resolve(Money::ZERO, "A", &equal),
            Err(SplitError::NonPositiveAmount(Money::ZERO))
        );
        assert_eq!(
            resolver.resolve(eur("5.00"), "Z", &equal),
            Err(SplitError::PayerNotInGroup("Z".to_string()))
        );
    }

    #[test]
    fn test_effect_of_matches_resolution() {
        let g = group(&["A", "B", "C"]);
        let resolved = SplitResolver::new(&g)
            .resolve(eur("10.01"), "B", &SplitSpec::Equal { participants: None })
            .unwrap();

        let now = chrono::Utc::now().naive_utc();
        let transaction = Transaction {
            id: "t1".to_string(),
            group_id: g.id.clone(),
            description: "Dinner".to_string(),
            amount: eur("10.01"),
            currency: GROUP_CURRENCY.to_string(),
            payer_id: "B".to_string(),
            split_type: resolved.split_type,
            split_details: resolved.split_details.clone(),
            recipient_id: resolved.recipient_id.clone(),
            participants: resolved.participants.clone(),
            version: 1,
            created_at: now,
            updated_at: now,
        };

        assert_eq!(effect_of(&transaction), resolved.effect("B"));
    }
}

//! Withdrawal capability model.
//!
//! Each mechanism owns a fixed bit in a `u32`. Masks are persisted and
//! compared across runs, so bit positions never change: new mechanisms take
//! the next free bit.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Label used when no bit is set.
pub const NO_API_WITHDRAWAL_METHODS_LABEL: &str = "NONE, WEBSITE ONLY";

/// A single withdrawal mechanism. The discriminant is the bit position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum WithdrawCapability {
    AutoWithdrawCrypto = 0,
    AutoWithdrawCryptoWithApiPermission = 1,
    AutoWithdrawCryptoWithSetup = 2,
    WithdrawCryptoWith2fa = 3,
    WithdrawCryptoWithSms = 4,
    WithdrawCryptoWithEmail = 5,
    WithdrawCryptoWithWebsiteApproval = 6,
    WithdrawCryptoWithApiPermission = 7,
    AutoWithdrawFiat = 8,
    AutoWithdrawFiatWithApiPermission = 9,
    AutoWithdrawFiatWithSetup = 10,
    WithdrawFiatWith2fa = 11,
    WithdrawFiatWithSms = 12,
    WithdrawFiatWithEmail = 13,
    WithdrawFiatWithWebsiteApproval = 14,
    WithdrawFiatWithApiPermission = 15,
    WithdrawCryptoViaWebsiteOnly = 16,
    WithdrawFiatViaWebsiteOnly = 17,
}

impl WithdrawCapability {
    /// Every known capability in bit order.
    pub const ALL: [WithdrawCapability; 18] = [
        WithdrawCapability::AutoWithdrawCrypto,
        WithdrawCapability::AutoWithdrawCryptoWithApiPermission,
        WithdrawCapability::AutoWithdrawCryptoWithSetup,
        WithdrawCapability::WithdrawCryptoWith2fa,
        WithdrawCapability::WithdrawCryptoWithSms,
        WithdrawCapability::WithdrawCryptoWithEmail,
        WithdrawCapability::WithdrawCryptoWithWebsiteApproval,
        WithdrawCapability::WithdrawCryptoWithApiPermission,
        WithdrawCapability::AutoWithdrawFiat,
        WithdrawCapability::AutoWithdrawFiatWithApiPermission,
        WithdrawCapability::AutoWithdrawFiatWithSetup,
        WithdrawCapability::WithdrawFiatWith2fa,
        WithdrawCapability::WithdrawFiatWithSms,
        WithdrawCapability::WithdrawFiatWithEmail,
        WithdrawCapability::WithdrawFiatWithWebsiteApproval,
        WithdrawCapability::WithdrawFiatWithApiPermission,
        WithdrawCapability::WithdrawCryptoViaWebsiteOnly,
        WithdrawCapability::WithdrawFiatViaWebsiteOnly,
    ];

    pub const fn bit(self) -> u32 {
        1 << (self as u8)
    }

    pub fn from_bit_position(position: u32) -> Option<Self> {
        Self::ALL.get(position as usize).copied()
    }

    pub const fn label(self) -> &'static str {
        match self {
            WithdrawCapability::AutoWithdrawCrypto => "AUTO WITHDRAW CRYPTO",
            WithdrawCapability::AutoWithdrawCryptoWithApiPermission => {
                "AUTO WITHDRAW CRYPTO WITH API PERMISSION"
            }
            WithdrawCapability::AutoWithdrawCryptoWithSetup => "AUTO WITHDRAW CRYPTO WITH SETUP",
            WithdrawCapability::WithdrawCryptoWith2fa => "WITHDRAW CRYPTO WITH 2FA",
            WithdrawCapability::WithdrawCryptoWithSms => "WITHDRAW CRYPTO WITH SMS",
            WithdrawCapability::WithdrawCryptoWithEmail => "WITHDRAW CRYPTO WITH EMAIL",
            WithdrawCapability::WithdrawCryptoWithWebsiteApproval => {
                "WITHDRAW CRYPTO WITH WEBSITE APPROVAL"
            }
            WithdrawCapability::WithdrawCryptoWithApiPermission => {
                "WITHDRAW CRYPTO WITH API PERMISSION"
            }
            WithdrawCapability::AutoWithdrawFiat => "AUTO WITHDRAW FIAT",
            WithdrawCapability::AutoWithdrawFiatWithApiPermission => {
                "AUTO WITHDRAW FIAT WITH API PERMISSION"
            }
            WithdrawCapability::AutoWithdrawFiatWithSetup => "AUTO WITHDRAW FIAT WITH SETUP",
            WithdrawCapability::WithdrawFiatWith2fa => "WITHDRAW FIAT WITH 2FA",
            WithdrawCapability::WithdrawFiatWithSms => "WITHDRAW FIAT WITH SMS",
            WithdrawCapability::WithdrawFiatWithEmail => "WITHDRAW FIAT WITH EMAIL",
            WithdrawCapability::WithdrawFiatWithWebsiteApproval => {
                "WITHDRAW FIAT WITH WEBSITE APPROVAL"
            }
            WithdrawCapability::WithdrawFiatWithApiPermission => {
                "WITHDRAW FIAT WITH API PERMISSION"
            }
            WithdrawCapability::WithdrawCryptoViaWebsiteOnly => "WITHDRAW CRYPTO VIA WEBSITE ONLY",
            WithdrawCapability::WithdrawFiatViaWebsiteOnly => "WITHDRAW FIAT VIA WEBSITE ONLY",
        }
    }
}

impl fmt::Display for WithdrawCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Packed set of [`WithdrawCapability`] flags.
///
/// Unknown bits are retained so a mask read from newer persisted state
/// survives a round trip unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WithdrawPermissions(u32);

impl WithdrawPermissions {
    /// No programmatic withdrawal; the venue's website is the only route.
    pub const NONE: WithdrawPermissions = WithdrawPermissions(0);

    const KNOWN_MASK: u32 = (1 << WithdrawCapability::ALL.len()) - 1;

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    pub const fn supports(self, capability: WithdrawCapability) -> bool {
        self.0 & capability.bit() != 0
    }

    pub fn insert(&mut self, capability: WithdrawCapability) {
        self.0 |= capability.bit();
    }

    /// Set bits that do not correspond to any known capability.
    pub const fn unknown_bits(self) -> u32 {
        self.0 & !Self::KNOWN_MASK
    }

    /// Active known capabilities in bit order.
    pub fn capabilities(self) -> Vec<WithdrawCapability> {
        WithdrawCapability::ALL
            .iter()
            .copied()
            .filter(|c| self.supports(*c))
            .collect()
    }

    /// Human-readable labels for every set bit, in bit order.
    ///
    /// A zero mask yields the explicit website-only sentinel instead of an
    /// empty list, and unknown bits are reported as `UNKNOWN[<bit value>]`.
    pub fn labels(self) -> Vec<String> {
        if self.is_none() {
            return vec![NO_API_WITHDRAWAL_METHODS_LABEL.to_string()];
        }

        (0..u32::BITS)
            .filter(|position| self.0 & (1 << position) != 0)
            .map(|position| match WithdrawCapability::from_bit_position(position) {
                Some(capability) => capability.label().to_string(),
                None => format!("UNKNOWN[{}]", 1u32 << position),
            })
            .collect()
    }

    /// Labels joined with `" & "`.
    pub fn format(self) -> String {
        self.labels().join(" & ")
    }
}

impl From<WithdrawCapability> for WithdrawPermissions {
    fn from(capability: WithdrawCapability) -> Self {
        Self(capability.bit())
    }
}

impl FromIterator<WithdrawCapability> for WithdrawPermissions {
    fn from_iter<I: IntoIterator<Item = WithdrawCapability>>(iter: I) -> Self {
        let mut permissions = Self::NONE;
        for capability in iter {
            permissions.insert(capability);
        }
        permissions
    }
}

impl BitOr for WithdrawCapability {
    type Output = WithdrawPermissions;

    fn bitor(self, rhs: Self) -> WithdrawPermissions {
        WithdrawPermissions(self.bit() | rhs.bit())
    }
}

impl BitOr<WithdrawCapability> for WithdrawPermissions {
    type Output = WithdrawPermissions;

    fn bitor(self, rhs: WithdrawCapability) -> WithdrawPermissions {
        WithdrawPermissions(self.0 | rhs.bit())
    }
}

impl BitOrAssign<WithdrawCapability> for WithdrawPermissions {
    fn bitor_assign(&mut self, rhs: WithdrawCapability) {
        self.insert(rhs);
    }
}

impl fmt::Display for WithdrawPermissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_mask_is_website_only() {
        let none = WithdrawPermissions::NONE;
        assert_eq!(none.labels(), vec!["NONE, WEBSITE ONLY".to_string()]);
        assert!(none.capabilities().is_empty());
    }

    #[test]
    fn test_bit_positions_are_stable() {
        assert_eq!(WithdrawCapability::AutoWithdrawCrypto.bit(), 1 << 0);
        assert_eq!(WithdrawCapability::WithdrawCryptoWithApiPermission.bit(), 1 << 7);
        assert_eq!(WithdrawCapability::AutoWithdrawFiat.bit(), 1 << 8);
        assert_eq!(WithdrawCapability::WithdrawFiatWithApiPermission.bit(), 1 << 15);
        assert_eq!(WithdrawCapability::WithdrawFiatViaWebsiteOnly.bit(), 1 << 17);
        for (position, capability) in WithdrawCapability::ALL.iter().enumerate() {
            assert_eq!(capability.bit(), 1 << position);
        }
    }

    #[test]
    fn test_decode_then_encode_round_trips() {
        for bits in [1u32, 0b101, 0x0003_FFFF, 0x0002_0100, 0x0001_8004] {
            let mask = WithdrawPermissions::from_bits(bits);
            let encoded: WithdrawPermissions = mask.capabilities().into_iter().collect();
            assert_eq!(encoded, mask);
            assert_eq!(mask.labels().len(), mask.capabilities().len());
        }
    }

    #[test]
    fn test_labels_in_bit_order() {
        let mask = WithdrawCapability::AutoWithdrawFiat | WithdrawCapability::AutoWithdrawCrypto;
        assert_eq!(mask.format(), "AUTO WITHDRAW CRYPTO & AUTO WITHDRAW FIAT");
        assert!(mask.supports(WithdrawCapability::AutoWithdrawCrypto));
        assert!(!mask.supports(WithdrawCapability::WithdrawCryptoWith2fa));
    }

    #[test]
    fn test_unknown_bits_are_labelled_and_retained() {
        let mask = WithdrawPermissions::from_bits((1 << 20) | 1);
        assert_eq!(mask.unknown_bits(), 1 << 20);
        assert_eq!(
            mask.labels(),
            vec![
                "AUTO WITHDRAW CRYPTO".to_string(),
                format!("UNKNOWN[{}]", 1u32 << 20)
            ]
        );
        assert_eq!(mask.bits(), (1 << 20) | 1);
    }
}

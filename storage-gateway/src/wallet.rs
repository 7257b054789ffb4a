//! Wallet connection flow.
//!
//! The wallet itself is external: it reports account and network changes, this module keeps
//! track of what they mean for the user.

use alloy::primitives::Address;
use alloy::primitives::U256;
use storage_messages::ChainId;

const WEI_PER_COIN: u64 = 1_000_000_000_000_000_000;
const COIN_DECIMALS: usize = 18;
const DISPLAYED_DECIMALS: usize = 4;

/// What the wallet reports.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WalletEvent {
    /// Authorized accounts, the first one is active. Empty once the user logs out.
    AccountsChanged(Vec<Address>),
    ChainChanged(ChainId),
    /// Native balance of the active account, in wei.
    BalanceFetched(U256),
    Disconnected,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    /// An account is authorized but the network is not known yet.
    Connecting { account: Address },
    WrongNetwork { account: Address, chain_id: ChainId },
    Connected {
        account: Address,
        balance: Option<U256>,
    },
}

#[derive(Clone, Debug)]
pub struct WalletSession {
    expected_chain_id: ChainId,
    account: Option<Address>,
    chain_id: Option<ChainId>,
    balance: Option<U256>,
}

impl WalletSession {
    pub fn new(expected_chain_id: ChainId) -> Self {
        Self {
            expected_chain_id,
            account: None,
            chain_id: None,
            balance: None,
        }
    }

    pub fn apply(
        &mut self,
        event: WalletEvent,
    ) {
        match event {
            WalletEvent::AccountsChanged(accounts) => match accounts.first() {
                Some(account) => {
                    if self.account != Some(*account) {
                        self.balance = None;
                    }
                    self.account = Some(*account);
                },
                None => self.reset(),
            },
            WalletEvent::ChainChanged(chain_id) => {
                self.chain_id = Some(chain_id);
                self.balance = None;
            },
            WalletEvent::BalanceFetched(balance) => {
                // Only meaningful for an account on the right network.
                if self.is_connected() {
                    self.balance = Some(balance);
                }
            },
            WalletEvent::Disconnected => self.reset(),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        match (self.account, self.chain_id) {
            (None, _) => ConnectionStatus::Disconnected,
            (Some(account), None) => ConnectionStatus::Connecting { account },
            (Some(account), Some(chain_id)) if chain_id != self.expected_chain_id => {
                ConnectionStatus::WrongNetwork { account, chain_id }
            },
            (Some(account), Some(_)) => ConnectionStatus::Connected {
                account,
                balance: self.balance,
            },
        }
    }

    /// Writes are only handed to a wallet connected on the expected network.
    pub fn is_connected(&self) -> bool {
        matches!(self.status(), ConnectionStatus::Connected { .. })
    }

    /// Whether the balance of the active account should be (re)fetched.
    pub fn needs_balance(&self) -> bool {
        self.is_connected() && self.balance.is_none()
    }

    pub fn account(&self) -> Option<Address> {
        self.account
    }

    fn reset(&mut self) {
        self.account = None;
        self.chain_id = None;
        self.balance = None;
    }
}

/// `0x1234...abcd`, from the checksummed address.
pub fn shorten_address(address: &Address) -> String {
    let full = address.to_checksum(None);
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

/// Wei rendered in whole coins with four decimals, truncated.
pub fn format_balance(wei: U256) -> String {
    let unit = U256::from(WEI_PER_COIN);
    let whole = wei / unit;
    let fraction = (wei % unit).to_string();
    let fraction = format!("{}{}", "0".repeat(COIN_DECIMALS - fraction.len()), fraction);

    format!("{}.{}", whole, &fraction[..DISPLAYED_DECIMALS])
}

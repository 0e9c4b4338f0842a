use serde::Serialize;

/// Destination account for manual transfers.
#[derive(Debug, Serialize)]
pub struct BankAccount {
    pub bank: &'static str,
    pub account_number: &'static str,
    pub account_name: &'static str,
}

pub static BANK_ACCOUNTS: [BankAccount; 3] = [
    BankAccount {
        bank: "Bank BCA",
        account_number: "1234567890",
        account_name: "AI Video Generator",
    },
    BankAccount {
        bank: "Bank Mandiri",
        account_number: "0987654321",
        account_name: "AI Video Generator",
    },
    BankAccount {
        bank: "Bank BNI",
        account_number: "5556667777",
        account_name: "AI Video Generator",
    },
];

pub fn find_bank(name: &str) -> Option<&'static BankAccount> {
    let name = name.trim();
    BANK_ACCOUNTS
        .iter()
        .find(|b| b.bank.eq_ignore_ascii_case(name))
}

//! Contract formation for local hosts
//!
//! Both parties sign the bincode encoding of the initial revision, so a
//! contract handed to the slab engine can be checked independently of
//! whoever formed it.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use renter_core::{
    Contract, ContractId, Currency, PublicKey, RenterError, Result, TransactionSignature,
};

/// Blocks a freshly formed contract runs before its proof window opens
pub const DEFAULT_CONTRACT_DURATION: u64 = 4032;

/// Length of the proof window in blocks
pub const PROOF_WINDOW: u64 = 144;

/// Renter payout locked into a new contract, in hastings
pub const DEFAULT_RENTER_FUNDS: Currency = Currency(1_000_000_000_000_000_000_000_000);

/// Public half of an ed25519 signing key
pub fn public_key(key: &SigningKey) -> PublicKey {
    PublicKey::from_bytes(key.verifying_key().to_bytes())
}

/// Generate a new ed25519 signing key
pub fn generate_key() -> SigningKey {
    SigningKey::generate(&mut OsRng)
}

/// Form a contract between `renter` and `host`, signed by both
pub fn form_contract(
    renter: &SigningKey,
    host: &SigningKey,
    host_ip: impl Into<String>,
    start_height: u64,
) -> Result<Contract> {
    let mut id = [0u8; 32];
    OsRng.fill_bytes(&mut id);
    let window_start = start_height + DEFAULT_CONTRACT_DURATION;

    let contract = Contract::new(
        ContractId::from_bytes(id),
        public_key(renter),
        public_key(host),
        host_ip,
    )
    .with_window(start_height, window_start, window_start + PROOF_WINDOW)
    .with_renter_funds(DEFAULT_RENTER_FUNDS);

    sign_contract(contract, renter, host)
}

/// Replace a contract with a renewal under a new id
///
/// The renewal keeps the host, address and funds of `old` and records the
/// id it was renewed from.
pub fn renew_contract(
    old: &Contract,
    renter: &SigningKey,
    host: &SigningKey,
    start_height: u64,
) -> Result<Contract> {
    if public_key(host) != old.host_key() {
        return Err(RenterError::InvalidContract(format!(
            "host key does not match contract {}",
            old.id()
        )));
    }

    let mut renewed = form_contract(renter, host, old.host_ip.clone(), start_height)?;
    renewed.revision.new_valid_proof_outputs = old.revision.new_valid_proof_outputs.clone();
    renewed.metadata.renewed_from = old.id();
    sign_contract(renewed, renter, host)
}

fn sign_contract(mut contract: Contract, renter: &SigningKey, host: &SigningKey) -> Result<Contract> {
    let message = bincode::serialize(&contract.revision)?;
    for (index, key) in [renter, host].into_iter().enumerate() {
        contract.signatures[index] = TransactionSignature {
            parent_id: contract.id(),
            public_key_index: index as u64,
            signature: key.sign(&message).to_bytes().to_vec(),
        };
    }
    Ok(contract)
}

/// Check both revision signatures of `contract`
pub fn verify_contract(contract: &Contract) -> Result<()> {
    let message = bincode::serialize(&contract.revision)?;
    let keys = &contract.revision.unlock_conditions.public_keys;

    for sig in &contract.signatures {
        let key = keys.get(sig.public_key_index as usize).ok_or_else(|| {
            RenterError::InvalidContract(format!(
                "signature refers to key {}",
                sig.public_key_index
            ))
        })?;
        let verifying = VerifyingKey::from_bytes(key.as_bytes())
            .map_err(|e| RenterError::InvalidContract(format!("bad public key {}: {}", key, e)))?;
        let signature = Signature::from_slice(&sig.signature)
            .map_err(|e| RenterError::InvalidContract(format!("malformed signature: {}", e)))?;
        verifying.verify(&message, &signature).map_err(|_| {
            RenterError::InvalidContract(format!(
                "signature {} does not cover contract {}",
                sig.public_key_index,
                contract.id()
            ))
        })?;
    }
    Ok(())
}

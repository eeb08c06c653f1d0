//! In-memory collaborators for tests.

use async_trait::async_trait;
use ethers::abi::Token;
use ethers::types::{Address, TxHash, U256};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio::sync::{broadcast, oneshot};

use crate::{
    contracts::ContractCallSpec,
    error::{AppError, Result},
    models::ChainDescriptor,
    services::{
        onchain::{ContractTransport, WriteRequest},
        wallet_provider::{describe_chain, ProviderEvent, WalletProvider},
    },
};

pub fn chain(id: u64, name: &str) -> ChainDescriptor {
    ChainDescriptor::new(id, name)
}

pub struct FakeWalletProvider {
    account: Mutex<Option<Address>>,
    chain: Mutex<Option<ChainDescriptor>>,
    known_chains: Vec<ChainDescriptor>,
    account_responses: Mutex<VecDeque<oneshot::Receiver<Result<Option<Address>>>>>,
    switch_gate: Mutex<Option<oneshot::Receiver<Result<()>>>>,
    switch_calls: Mutex<Vec<u64>>,
    switch_moves_chain: bool,
    fetch_calls: Mutex<usize>,
    events: broadcast::Sender<ProviderEvent>,
}

impl FakeWalletProvider {
    pub fn new(account: Option<Address>, chain: Option<ChainDescriptor>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            account: Mutex::new(account),
            chain: Mutex::new(chain),
            known_chains: Vec::new(),
            account_responses: Mutex::new(VecDeque::new()),
            switch_gate: Mutex::new(None),
            switch_calls: Mutex::new(Vec::new()),
            switch_moves_chain: true,
            fetch_calls: Mutex::new(0),
            events,
        }
    }

    pub fn with_known_chains(mut self, chains: Vec<ChainDescriptor>) -> Self {
        self.known_chains = chains;
        self
    }

    /// Switch requests succeed but the wallet keeps reporting its old chain.
    pub fn with_lagging_switch(mut self) -> Self {
        self.switch_moves_chain = false;
        self
    }

    pub fn set_account(&self, account: Option<Address>) {
        *self.account.lock().unwrap() = account;
        let _ = self.events.send(ProviderEvent::AccountChanged(account));
    }

    pub fn set_chain(&self, chain: Option<ChainDescriptor>) {
        *self.chain.lock().unwrap() = chain.clone();
        let _ = self.events.send(ProviderEvent::ChainChanged(chain));
    }

    /// The next `fetch_active_account` waits for the returned sender.
    pub fn defer_next_fetch(&self) -> oneshot::Sender<Result<Option<Address>>> {
        let (tx, rx) = oneshot::channel();
        self.account_responses.lock().unwrap().push_back(rx);
        tx
    }

    /// The next `request_chain_switch` waits for the returned sender.
    pub fn hold_next_switch(&self) -> oneshot::Sender<Result<()>> {
        let (tx, rx) = oneshot::channel();
        *self.switch_gate.lock().unwrap() = Some(rx);
        tx
    }

    pub fn switch_calls(&self) -> Vec<u64> {
        self.switch_calls.lock().unwrap().clone()
    }

    pub fn fetch_calls(&self) -> usize {
        *self.fetch_calls.lock().unwrap()
    }
}

#[async_trait]
impl WalletProvider for FakeWalletProvider {
    fn connected_account(&self) -> Option<Address> {
        *self.account.lock().unwrap()
    }

    fn active_chain(&self) -> Option<ChainDescriptor> {
        self.chain.lock().unwrap().clone()
    }

    async fn fetch_active_account(&self) -> Result<Option<Address>> {
        *self.fetch_calls.lock().unwrap() += 1;
        let deferred = self.account_responses.lock().unwrap().pop_front();
        match deferred {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(AppError::Provider("response dropped".to_string()))),
            None => Ok(*self.account.lock().unwrap()),
        }
    }

    async fn request_chain_switch(&self, chain_id: u64) -> Result<()> {
        self.switch_calls.lock().unwrap().push(chain_id);
        let gate = self.switch_gate.lock().unwrap().take();
        if let Some(rx) = gate {
            rx.await
                .unwrap_or_else(|_| Err(AppError::ChainSwitch("gate dropped".to_string())))?;
        }
        if self.switch_moves_chain {
            self.set_chain(Some(describe_chain(chain_id, &self.known_chains)));
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}

#[derive(Default)]
pub struct FakeTransport {
    reads: Mutex<HashMap<String, Result<Vec<Token>>>>,
    read_calls: Mutex<Vec<(String, Address)>>,
    read_gate: Mutex<Option<oneshot::Receiver<()>>>,
    balance: Mutex<U256>,
    balance_calls: Mutex<Vec<Address>>,
    write_result: Mutex<Option<Result<TxHash>>>,
    write_gate: Mutex<Option<oneshot::Receiver<()>>>,
    writes: Mutex<Vec<WriteRequest>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_read(&self, function: &str, result: Result<Vec<Token>>) {
        self.reads
            .lock()
            .unwrap()
            .insert(function.to_string(), result);
    }

    pub fn respond_uint(&self, function: &str, raw: &str) {
        let value = U256::from_dec_str(raw).expect("decimal literal");
        self.respond_read(function, Ok(vec![Token::Uint(value)]));
    }

    /// The next `call_read` waits for the returned sender.
    pub fn hold_next_read(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.read_gate.lock().unwrap() = Some(rx);
        tx
    }

    pub fn set_balance(&self, balance: U256) {
        *self.balance.lock().unwrap() = balance;
    }

    pub fn respond_write(&self, result: Result<TxHash>) {
        *self.write_result.lock().unwrap() = Some(result);
    }

    /// The next `submit_write` waits for the returned sender.
    pub fn hold_next_write(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.write_gate.lock().unwrap() = Some(rx);
        tx
    }

    pub fn read_calls(&self) -> Vec<(String, Address)> {
        self.read_calls.lock().unwrap().clone()
    }

    pub fn balance_calls(&self) -> Vec<Address> {
        self.balance_calls.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<WriteRequest> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContractTransport for FakeTransport {
    async fn call_read(&self, spec: &ContractCallSpec, caller: Address) -> Result<Vec<Token>> {
        let name = spec.function_name().to_string();
        self.read_calls.lock().unwrap().push((name.clone(), caller));
        let gate = self.read_gate.lock().unwrap().take();
        if let Some(rx) = gate {
            let _ = rx.await;
        }
        self.reads
            .lock()
            .unwrap()
            .get(&name)
            .cloned()
            .unwrap_or_else(|| Err(AppError::BlockchainRPC(format!("no response for {}", name))))
    }

    async fn submit_write(&self, request: WriteRequest) -> Result<TxHash> {
        self.writes.lock().unwrap().push(request);
        let gate = self.write_gate.lock().unwrap().take();
        if let Some(rx) = gate {
            let _ = rx.await;
        }
        self.write_result
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Ok(TxHash::repeat_byte(0x42)))
    }

    async fn native_balance(&self, address: Address) -> Result<U256> {
        self.balance_calls.lock().unwrap().push(address);
        Ok(*self.balance.lock().unwrap())
    }
}

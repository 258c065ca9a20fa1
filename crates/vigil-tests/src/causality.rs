//! Cross-replica causality scenarios: dependent writes stay parked until
//! anti-entropy delivers their antecedents, and the read gate keeps a
//! client from silently reading a replica that lags its own writes.

//! Anti-entropy convergence scenarios: repeated rounds make every
//! replica's visible list set-equal and every clock slot agree, without
//! duplicating batches, and clocks only ever move forward.

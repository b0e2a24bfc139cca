use proptest::prelude::*;
use tilek_arch::Arch;
use tilek_graph::{ElemType, OpNode};

use crate::factor::{all_factors, factorize};
use crate::tensorcore::TensorCorePolicy;
use crate::traits::TilingPolicy;

proptest! {
    #[test]
    fn factorize_product_reconstructs(n in 1usize..10_000) {
        prop_assert_eq!(factorize(n).iter().product::<usize>(), n);
    }

    #[test]
    fn factorize_yields_primes_ascending(n in 2usize..10_000) {
        let factors = factorize(n);
        prop_assert!(factors.windows(2).all(|w| w[0] <= w[1]));
        for f in factors {
            prop_assert!(f >= 2);
            prop_assert!((2..f).all(|d| !f.is_multiple_of(d)));
        }
    }

    #[test]
    fn all_factors_sorted_divisors_closed_under_complement(n in 1usize..10_000) {
        let factors = all_factors(n);
        prop_assert!(factors.windows(2).all(|w| w[0] < w[1]));
        prop_assert!(factors.iter().all(|f| n.is_multiple_of(*f)));
        prop_assert!(factors.iter().all(|f| factors.contains(&(n / f))));
    }

    #[test]
    fn tensorcore_step_law_for_aligned_domains(mult in 1usize..64) {
        // For domains that are multiples of 16, the assigned step is 32
        // when the domain divides by 32, else 16 (only dom == 16 remains).
        let dom = mult * 16;
        let node = OpNode::matmul("gemm", 128, 128, dom, ElemType::Float16, ElemType::Float32);
        let policy = TensorCorePolicy::single(node.clone(), Arch::sm80());
        let steps = policy.assign_reduce_step(&node);
        let expected = if dom.is_multiple_of(32) { 32 } else if dom < 32 { 16 } else { 32 };
        prop_assert_eq!(steps["k"], expected);
    }

    #[test]
    fn tensorcore_candidates_are_wmma_multiples(mult in 1usize..32) {
        let dom = mult * 16;
        let node = OpNode::matmul("gemm", 128, 128, dom, ElemType::Float16, ElemType::Float32);
        let policy = TensorCorePolicy::single(node.clone(), Arch::sm80());
        let candidates = policy.reduce_step_candidates(&node);
        let steps = &candidates["k"];
        prop_assert!(!steps.is_empty());
        prop_assert!(steps.iter().all(|s| s.is_multiple_of(16) && dom.is_multiple_of(*s)));
    }
}

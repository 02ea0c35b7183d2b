//! End-to-end encode/decode scenarios across both code families.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::gf;
use crate::{BufferMode, CodeFamily, CoderOptions, Error, ErasureCoder, MsrDecoder, RsDecoder, Schema, Slot};

fn random_units(rng: &mut StdRng, count: usize, len: usize) -> Vec<Vec<u8>> {
    (0..count)
        .map(|_| {
            let mut unit = vec![0u8; len];
            rng.fill(&mut unit[..]);
            unit
        })
        .collect()
}

/// Data units followed by their parity units.
fn encode_units(coder: &ErasureCoder, data: &[Vec<u8>]) -> Vec<Vec<u8>> {
    let len = data[0].len();
    let refs: Vec<&[u8]> = data.iter().map(Vec::as_slice).collect();
    let mut parity = vec![vec![0u8; len]; coder.schema().parity_units()];
    let mut outs: Vec<&mut [u8]> = parity.iter_mut().map(Vec::as_mut_slice).collect();
    coder.encode(&refs, &mut outs).unwrap();
    data.iter().cloned().chain(parity).collect()
}

fn slots_without<'a>(units: &'a [Vec<u8>], erased: &[usize]) -> Vec<Slot<'a>> {
    units
        .iter()
        .enumerate()
        .map(|(i, u)| if erased.contains(&i) { Slot::Absent } else { Slot::present(u) })
        .collect()
}

fn erasure_patterns(n: usize, max: usize) -> Vec<Vec<usize>> {
    (0u32..(1 << n))
        .filter(|mask| (mask.count_ones() as usize) <= max)
        .map(|mask| (0..n).filter(|i| mask & (1 << i) != 0).collect())
        .collect()
}

/// Erase `erased` from `units`, decode with `coder`, and compare.
fn check_recovery(coder: &mut ErasureCoder, units: &[Vec<u8>], erased: &[usize]) {
    let len = units[0].len();
    let slots = slots_without(units, erased);
    let mut recovered = vec![vec![0u8; len]; erased.len()];
    let mut outs: Vec<&mut [u8]> = recovered.iter_mut().map(Vec::as_mut_slice).collect();
    coder.decode(&slots, erased, &mut outs).unwrap();
    for (out, &e) in recovered.iter().zip(erased) {
        assert_eq!(out, &units[e], "erased={erased:?} unit={e}");
    }
}

#[test]
fn test_rs_erase_data_and_parity() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut coder = ErasureCoder::new(&CoderOptions::new(4, 2)).unwrap();
    let data = random_units(&mut rng, 4, 1024);
    let units = encode_units(&coder, &data);
    check_recovery(&mut coder, &units, &[0, 5]);
}

#[test]
fn test_rs_every_pattern() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut coder = ErasureCoder::new(&CoderOptions::new(4, 2)).unwrap();
    let data = random_units(&mut rng, 4, 1024);
    let units = encode_units(&coder, &data);
    let patterns = erasure_patterns(6, 2);
    assert_eq!(patterns.len(), 1 + 6 + 15);
    for erased in patterns {
        check_recovery(&mut coder, &units, &erased);
    }
}

#[test]
fn test_rs_pcm_every_pattern() {
    let mut rng = StdRng::seed_from_u64(8);
    let mut coder = ErasureCoder::new(&CoderOptions::new(6, 3).use_pcm(true)).unwrap();
    let data = random_units(&mut rng, 6, 100);
    let units = encode_units(&coder, &data);
    for erased in erasure_patterns(9, 3) {
        check_recovery(&mut coder, &units, &erased);
    }
}

#[test]
fn test_msr_single_erasure_uses_repair_bandwidth() {
    let mut rng = StdRng::seed_from_u64(63);
    let options = CoderOptions::new(3, 3).family(CodeFamily::Msr);
    let mut coder = ErasureCoder::new(&options).unwrap();
    assert_eq!(coder.schema().sub_packets(), 9);
    let len = 2 * coder.schema().slice_unit();
    let data = random_units(&mut rng, 3, len);
    let units = encode_units(&coder, &data);

    check_recovery(&mut coder, &units, &[1]);

    let ErasureCoder::Msr { decoder, .. } = &coder else {
        panic!("expected an MSR coder");
    };
    let plan = decoder.cached_plan().unwrap();
    assert_eq!(plan.inputs.len(), (6 - 1) * 9 / 3);
    assert_eq!(plan.outputs, (9..18).collect::<Vec<_>>());
    assert_eq!(decoder.repair_plan(&[1]).unwrap().count(), 15);
}

#[test]
fn test_msr_single_erasure_with_missing_survivor() {
    let mut rng = StdRng::seed_from_u64(64);
    let options = CoderOptions::new(3, 3).family(CodeFamily::Msr);
    let mut decoder = MsrDecoder::new(Schema::new(&options).unwrap()).unwrap();
    let coder = ErasureCoder::new(&options).unwrap();
    let len = coder.schema().slice_unit();
    let data = random_units(&mut rng, 3, len);
    let units = encode_units(&coder, &data);

    // Unit 4 is absent but not requested, so the repair slots are incomplete.
    let slots = slots_without(&units, &[1, 4]);
    let mut out = vec![0u8; len];
    decoder.decode(&slots, &[1], &mut [&mut out]).unwrap();
    assert_eq!(out, units[1]);

    let plan = decoder.cached_plan().unwrap();
    assert_eq!(plan.inputs.len(), 3 * 9);
    assert!(plan.inputs.iter().all(|&i| i / 9 != 4));
    assert_eq!(plan.outputs, (9..18).collect::<Vec<_>>());
}

#[test]
fn test_inverse_of_200() {
    let x = gf::inv(200).unwrap();
    assert_eq!(gf::mul(x, 200), 1);
}

#[test]
fn test_insufficient_inputs() {
    let mut rng = StdRng::seed_from_u64(5);
    let mut coder = ErasureCoder::new(&CoderOptions::new(4, 2)).unwrap();
    let data = random_units(&mut rng, 4, 64);
    let units = encode_units(&coder, &data);

    // Units 0 and 1 erased, unit 5 simply missing: 3 valid < k = 4.
    let slots = slots_without(&units, &[0, 1, 5]);
    let mut a = vec![0x55u8; 64];
    let mut b = vec![0x55u8; 64];
    let err = coder.decode(&slots, &[0, 1], &mut [&mut a, &mut b]).unwrap_err();
    assert_eq!(err, Error::InsufficientInputs { needed: 4, got: 3 });
    assert!(a.iter().chain(&b).all(|&x| x == 0x55));
}

#[test]
fn test_msr_every_pattern() {
    for (k, r, seed) in [(2, 2, 1u64), (3, 3, 2)] {
        let mut rng = StdRng::seed_from_u64(seed);
        let options = CoderOptions::new(k, r).family(CodeFamily::Msr);
        let mut coder = ErasureCoder::new(&options).unwrap();
        let len = coder.schema().slice_unit();
        let data = random_units(&mut rng, k, len);
        let units = encode_units(&coder, &data);
        for erased in erasure_patterns(k + r, r) {
            check_recovery(&mut coder, &units, &erased);
        }
    }
}

#[test]
fn test_msr_pcm_matches_generator() {
    let mut rng = StdRng::seed_from_u64(11);
    let base = CoderOptions::new(3, 3).family(CodeFamily::Msr).slice_unit(18);
    let mut generator = MsrDecoder::new(Schema::new(&base).unwrap()).unwrap();
    let mut pcm = MsrDecoder::new(Schema::new(&base.clone().use_pcm(true)).unwrap()).unwrap();
    let coder = ErasureCoder::new(&base).unwrap();
    let data = random_units(&mut rng, 3, 36);
    let units = encode_units(&coder, &data);

    for erased in [vec![0, 1], vec![2, 4, 5], vec![3, 5]] {
        let slots = slots_without(&units, &erased);
        let mut a = vec![vec![0u8; 36]; erased.len()];
        let mut b = vec![vec![0u8; 36]; erased.len()];
        let mut outs_a: Vec<&mut [u8]> = a.iter_mut().map(Vec::as_mut_slice).collect();
        let mut outs_b: Vec<&mut [u8]> = b.iter_mut().map(Vec::as_mut_slice).collect();
        generator.decode(&slots, &erased, &mut outs_a).unwrap();
        pcm.decode(&slots, &erased, &mut outs_b).unwrap();
        assert_eq!(
            generator.cached_plan().unwrap().matrix,
            pcm.cached_plan().unwrap().matrix,
            "erased={erased:?}"
        );
        assert_eq!(a, b);
    }
}

#[test]
fn test_copy_and_view_modes_agree() {
    let mut rng = StdRng::seed_from_u64(21);
    let base = CoderOptions::new(4, 2).family(CodeFamily::Msr).slice_unit(16);
    let mut view = ErasureCoder::new(&base.clone().buffer_mode(BufferMode::View)).unwrap();
    let mut copy = ErasureCoder::new(&base.buffer_mode(BufferMode::Copy)).unwrap();
    let data = random_units(&mut rng, 4, 64);
    let units = encode_units(&view, &data);
    assert_eq!(encode_units(&copy, &data), units);
    for erased in [vec![2], vec![1, 4]] {
        check_recovery(&mut view, &units, &erased);
        check_recovery(&mut copy, &units, &erased);
    }
}

#[test]
fn test_cache_reuse_and_rebuild() {
    let mut rng = StdRng::seed_from_u64(3);
    let schema = Schema::new(&CoderOptions::new(4, 2)).unwrap();
    let mut decoder = RsDecoder::new(schema).unwrap();
    let coder = ErasureCoder::new(&CoderOptions::new(4, 2)).unwrap();
    let data = random_units(&mut rng, 4, 32);
    let units = encode_units(&coder, &data);

    let mut decode = |erased: &[usize], missing: &[usize]| {
        let slots = slots_without(&units, missing);
        let mut out = vec![vec![0u8; 32]; erased.len()];
        let mut outs: Vec<&mut [u8]> = out.iter_mut().map(Vec::as_mut_slice).collect();
        decoder.decode(&slots, erased, &mut outs).unwrap();
        for (o, &e) in out.iter().zip(erased) {
            assert_eq!(o, &units[e]);
        }
    };
    decode(&[1], &[1]);
    decode(&[1], &[1]);
    // Same erasure, but unit 0 also missing: the valid set changed.
    decode(&[1], &[0, 1]);
    decode(&[2, 3], &[2, 3]);
    decode(&[2, 3], &[2, 3]);

    assert_eq!(decoder.plan_builds(), 3);
    assert_eq!(decoder.plan_hits(), 2);
}

#[test]
fn test_errors_do_not_poison_coder() {
    let mut rng = StdRng::seed_from_u64(9);
    let mut coder = ErasureCoder::new(&CoderOptions::new(3, 3).family(CodeFamily::Msr).slice_unit(9)).unwrap();
    let data = random_units(&mut rng, 3, 27);
    let units = encode_units(&coder, &data);

    let slots = slots_without(&units, &[0]);
    let mut short = vec![0u8; 9];
    assert!(matches!(
        coder.decode(&slots, &[0], &mut [&mut short]),
        Err(Error::LengthMismatch { .. })
    ));
    let mut out = vec![0u8; 27];
    assert!(matches!(
        coder.decode(&slots, &[0, 0], &mut [&mut out, &mut short]),
        Err(Error::InvalidErasure(_))
    ));
    let all_missing = slots_without(&units, &[0, 1, 2, 3]);
    let mut other = vec![0u8; 9];
    assert!(matches!(
        coder.decode(&all_missing, &[0, 1, 2], &mut [&mut out, &mut short, &mut other]),
        Err(Error::LengthMismatch { .. })
    ));

    check_recovery(&mut coder, &units, &[0]);
    check_recovery(&mut coder, &units, &[0, 3, 5]);
}

#[test]
fn test_erased_but_present_slot_is_ignored() {
    let mut rng = StdRng::seed_from_u64(4);
    let mut coder = ErasureCoder::new(&CoderOptions::new(2, 2)).unwrap();
    let data = random_units(&mut rng, 2, 16);
    let units = encode_units(&coder, &data);
    let garbage = vec![0xffu8; 16];
    let slots = [
        Slot::present(&garbage),
        Slot::present(&units[1]),
        Slot::present(&units[2]),
        Slot::present(&units[3]),
    ];
    let mut out = vec![0u8; 16];
    coder.decode(&slots, &[0], &mut [&mut out]).unwrap();
    assert_eq!(out, units[0]);
}

#[test]
fn test_verbose_dump_round_trip() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("regen_ec=debug"))
        .with_test_writer()
        .finish();
    tracing::subscriber::with_default(subscriber, || {
        let mut rng = StdRng::seed_from_u64(12);
        let options = CoderOptions::new(2, 2)
            .family(CodeFamily::Msr)
            .allow_verbose_dump(true)
            .slice_unit(4);
        let mut coder = ErasureCoder::new(&options).unwrap();
        let data = random_units(&mut rng, 2, 8);
        let units = encode_units(&coder, &data);
        check_recovery(&mut coder, &units, &[0, 3]);
    });
}

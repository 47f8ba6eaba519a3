//! Parsing and scheduling benchmarks
//!
//! Stream load time is what a player pays before the first frame, so the
//! SPS parser, the NAL walk and the full frame-table build are measured on
//! synthetic streams of increasing length.

use avcplay_lib::codec::h264::writer::{build_nal, write_length_prefixed};
use avcplay_lib::codec::h264::{
    BitstreamWriter, LengthPrefixedNals, NalHeader, NalUnitType, ParameterSetTable,
};
use avcplay_lib::config::PlayerConfig;
use avcplay_lib::format::MemorySource;
use avcplay_lib::hwaccel::RecordingAccelerator;
use avcplay_lib::player::{load_stream, Player};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

/// 1920x1080 high profile SPS with four reference frames and cropping
fn sps_nal() -> Vec<u8> {
    let mut w = BitstreamWriter::new();
    w.write_bits(100, 8);
    w.write_bits(0, 8);
    w.write_bits(40, 8);
    w.write_ue(0); // sps id
    w.write_ue(1); // chroma_format_idc
    w.write_ue(0); // bit_depth_luma_minus8
    w.write_ue(0); // bit_depth_chroma_minus8
    w.write_bit(false); // qpprime_y_zero_transform_bypass
    w.write_bit(false); // seq_scaling_matrix_present
    w.write_ue(0); // log2_max_frame_num_minus4
    w.write_ue(2); // pic_order_cnt_type
    w.write_ue(4); // max_num_ref_frames
    w.write_bit(false);
    w.write_ue(119);
    w.write_ue(67);
    w.write_bit(true); // frame_mbs_only
    w.write_bit(true); // direct_8x8_inference
    w.write_bit(true); // frame_cropping
    w.write_ue(0);
    w.write_ue(0);
    w.write_ue(0);
    w.write_ue(4); // crop bottom 8 lines
    w.write_bit(false); // vui
    build_nal(NalHeader::new(3, NalUnitType::Sps), &w.finish())
}

fn pps_nal() -> Vec<u8> {
    let mut w = BitstreamWriter::new();
    w.write_ue(0);
    w.write_ue(0);
    w.write_bit(true); // CABAC
    w.write_bit(false);
    w.write_ue(0);
    w.write_ue(0);
    w.write_ue(0);
    w.write_bit(false);
    w.write_bits(0, 2);
    w.write_se(0);
    w.write_se(0);
    w.write_se(0);
    w.write_bit(true);
    w.write_bit(false);
    w.write_bit(false);
    build_nal(NalHeader::new(3, NalUnitType::Pps), &w.finish())
}

/// IDR or reference P slice with `payload` filler bytes
fn slice_sample(frame_num: u32, payload: usize) -> Vec<u8> {
    let idr = frame_num == 0;
    let mut w = BitstreamWriter::new();
    w.write_ue(0);
    w.write_ue(if idr { 7 } else { 5 });
    w.write_ue(0);
    w.write_bits(frame_num & 0xF, 4);
    if idr {
        w.write_ue(0); // idr_pic_id
        w.write_bit(false); // no_output_of_prior_pics
        w.write_bit(false); // long_term_reference
    } else {
        w.write_bit(false); // num_ref_idx_active_override
        w.write_bit(false); // ref_pic_list_modification_flag_l0
        w.write_bit(false); // adaptive_ref_pic_marking_mode
        w.write_ue(0); // cabac_init_idc
    }
    w.write_se(0); // slice_qp_delta
    w.write_ue(1); // disable_deblocking_filter_idc
    let mut rbsp = w.finish();
    rbsp.extend((0..payload).map(|i| 0x40 | (i as u8 & 0x3F)));
    let nal_type = if idr {
        NalUnitType::IdrSlice
    } else {
        NalUnitType::Slice
    };
    let mut sample = Vec::new();
    write_length_prefixed(&mut sample, &build_nal(NalHeader::new(2, nal_type), &rbsp));
    sample
}

fn source(frames: usize) -> MemorySource {
    let mut builder = MemorySource::builder(1920, 1080, 90000)
        .sps(sps_nal())
        .pps(pps_nal());
    for i in 0..frames {
        // GOP of 30, frame_num wraps at 16
        let frame_num = (i % 30) as u32;
        let payload = if frame_num == 0 { 40_000 } else { 4_000 };
        builder = builder.sample(&slice_sample(frame_num, payload), 3000, frame_num == 0);
    }
    builder.build()
}

fn bench_parameter_sets(c: &mut Criterion) {
    let sps = sps_nal();
    let pps = pps_nal();

    c.bench_function("sps_pps_parse", |b| {
        b.iter(|| {
            let mut table = ParameterSetTable::new();
            table.add_sps(black_box(&sps)).unwrap();
            table.add_pps(black_box(&pps)).unwrap();
            black_box(table.num_dpb_slots())
        })
    });
}

fn bench_nal_walk(c: &mut Criterion) {
    let mut sample = Vec::new();
    for _ in 0..64 {
        write_length_prefixed(&mut sample, &sps_nal());
    }
    sample.extend(slice_sample(0, 100_000));

    let mut group = c.benchmark_group("nal_walk");
    group.throughput(Throughput::Bytes(sample.len() as u64));
    group.bench_function("length_prefixed", |b| {
        b.iter(|| LengthPrefixedNals::new(black_box(&sample)).count())
    });
    group.finish();
}

fn bench_load_stream(c: &mut Criterion) {
    let mut group = c.benchmark_group("load_stream");
    for frames in [30usize, 300, 1800] {
        let source = source(frames);
        group.throughput(Throughput::Elements(frames as u64));
        group.bench_with_input(BenchmarkId::from_parameter(frames), &source, |b, source| {
            b.iter(|| load_stream(black_box(source)).unwrap())
        });
    }
    group.finish();
}

fn bench_playback(c: &mut Criterion) {
    let source = source(300);

    c.bench_function("playback_300_frames", |b| {
        b.iter(|| {
            let mut player = Player::open(
                source.clone(),
                RecordingAccelerator::new(),
                PlayerConfig::default(),
            )
            .unwrap();
            while !player.is_stopped() {
                player.update(1.0 / 30.0).unwrap();
            }
            black_box(player.decode_frame_number())
        })
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(20);
    targets =
        bench_parameter_sets,
        bench_nal_walk,
        bench_load_stream,
        bench_playback,
}

criterion_main!(benches);

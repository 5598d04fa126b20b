//! EngineHandle, device lifecycle and Upscaler driven by an in-process
//! stub engine that upscales with nearest-neighbour sampling.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use realesrgan_bind::{
    create_gpu_instance, destroy_gpu_instance, get_default_gpu_index, get_gpu_count, Backend,
    Device, EngineHandle, Error, GpuInstance, ImageBuffer, InstanceState, MatView, MatViewMut,
    Parameters, Upscaler, UpscalerConfig, CPU_TILE_SIZE, PREPADDING,
};

struct StubBackend {
    gpu_count: i32,
    heap_budget: u32,
    create_instance_status: i32,
    process_status: i32,
    state: InstanceState,
    configured: Mutex<Vec<Parameters>>,
    sessions_destroyed: AtomicUsize,
    instance_destroys: AtomicUsize,
}

impl StubBackend {
    fn new(heap_budget: u32) -> Self {
        Self {
            gpu_count: 2,
            heap_budget,
            create_instance_status: 0,
            process_status: 0,
            state: InstanceState::new(),
            configured: Mutex::new(Vec::new()),
            sessions_destroyed: AtomicUsize::new(0),
            instance_destroys: AtomicUsize::new(0),
        }
    }
}

struct StubSession {
    scale: u32,
}

impl Backend for StubBackend {
    type Session = StubSession;

    fn gpu_count(&self) -> i32 {
        self.gpu_count
    }

    fn default_gpu_index(&self) -> i32 {
        0
    }

    fn create_gpu_instance(&self) -> i32 {
        self.create_instance_status
    }

    fn destroy_gpu_instance(&self) {
        self.instance_destroys.fetch_add(1, Ordering::SeqCst);
    }

    fn heap_budget(&self, _gpu_index: u32) -> u32 {
        self.heap_budget
    }

    fn instance_state(&self) -> &InstanceState {
        &self.state
    }

    fn create_session(&self, _device: Device, _tta_mode: bool) -> realesrgan_bind::Result<StubSession> {
        Ok(StubSession { scale: 0 })
    }

    fn destroy_session(&self, _session: &mut StubSession) {
        self.sessions_destroyed.fetch_add(1, Ordering::SeqCst);
    }

    fn configure(&self, session: &mut StubSession, params: &Parameters) {
        session.scale = params.scale;
        self.configured.lock().unwrap().push(*params);
    }

    fn load(&self, _session: &mut StubSession, param_path: &Path, _model_path: &Path) -> realesrgan_bind::Result<i32> {
        Ok(if param_path.to_string_lossy().contains("corrupt") {
            -1
        } else {
            0
        })
    }

    fn process(&self, session: &StubSession, input: MatView<'_>, output: MatViewMut<'_>) -> i32 {
        if self.process_status != 0 {
            return self.process_status;
        }
        let s = session.scale as usize;
        let c = input.channels as usize;
        let (in_w, out_w) = (input.width as usize, output.width as usize);
        for y in 0..output.height as usize {
            for x in 0..out_w {
                let src = ((y / s) * in_w + x / s) * c;
                let dst = (y * out_w + x) * c;
                output.data[dst..dst + c].copy_from_slice(&input.data[src..src + c]);
            }
        }
        0
    }
}

fn ready_engine(backend: Arc<StubBackend>, scale: u32) -> EngineHandle<StubBackend> {
    let mut engine = EngineHandle::new(backend, Device::Gpu(0), false).unwrap();
    engine.set_parameters(0, scale);
    engine.load("x.param", "x.bin").unwrap();
    engine
}

#[test]
fn set_parameters_auto_uses_heap_budget() {
    let backend = Arc::new(StubBackend::new(600));
    let mut engine = EngineHandle::new(backend.clone(), Device::Gpu(1), false).unwrap();

    engine.set_parameters(0, 4);
    let params = engine.parameters().unwrap();
    assert_eq!(params.tile_size, 100);
    assert_eq!(params.scale, 4);
    assert_eq!(params.prepadding, PREPADDING);

    engine.set_parameters(128, 4);
    assert_eq!(engine.parameters().unwrap().tile_size, 128);

    let configured = backend.configured.lock().unwrap();
    assert_eq!(configured.len(), 2);
    assert_eq!(configured[1].tile_size, 128);
    assert!(configured.iter().all(|p| p.prepadding == 10));
}

#[test]
fn oversized_parameters_fit_engine_int() {
    let backend = Arc::new(StubBackend::new(2000));
    let mut engine = EngineHandle::new(backend.clone(), Device::Gpu(0), false).unwrap();
    engine.set_parameters(u32::MAX, 4);

    let configured = backend.configured.lock().unwrap();
    let tile_size = configured.last().unwrap().tile_size;
    assert_eq!(i32::try_from(tile_size), Ok(i32::MAX));
}

#[test]
fn cpu_session_skips_heap_budget() {
    let backend = Arc::new(StubBackend::new(0));
    let mut engine = EngineHandle::new(backend, Device::Cpu, true).unwrap();
    assert_eq!(engine.compute_default_tile_size(), CPU_TILE_SIZE);
    engine.set_parameters(0, 2);
    assert_eq!(engine.parameters().unwrap().tile_size, CPU_TILE_SIZE);
    assert!(engine.tta_mode());
}

#[test]
fn invalid_gpu_index_rejected() {
    let backend = Arc::new(StubBackend::new(2000));
    let err = EngineHandle::new(backend.clone(), Device::Gpu(2), false)
        .err()
        .unwrap();
    assert!(matches!(
        err,
        Error::InvalidDevice {
            requested: 2,
            available: 2
        }
    ));
    assert_eq!(backend.state.live_handles(), 0);
}

#[test]
fn process_black_frame() {
    let backend = Arc::new(StubBackend::new(2000));
    let engine = ready_engine(backend, 4);

    let (w, h, c) = (8u32, 6u32, 3u32);
    let input = ImageBuffer::zeroed(w, h, c).unwrap();
    let mut output = ImageBuffer::new(vec![0xAA; (w * 4 * h * 4 * c) as usize], w * 4, h * 4, c).unwrap();

    engine.process(&input, &mut output).unwrap();

    let data = output.get_data();
    assert_eq!(data.len(), ((w * 4) * (h * 4) * c) as usize);
    assert!(data.iter().all(|&b| b == 0));
}

#[test]
fn process_writes_output_in_place() {
    let backend = Arc::new(StubBackend::new(2000));
    let engine = ready_engine(backend, 2);

    let input = ImageBuffer::new(vec![10, 20, 30, 40], 2, 2, 1).unwrap();
    let mut output = ImageBuffer::zeroed(4, 4, 1).unwrap();
    engine.process(&input, &mut output).unwrap();

    #[rustfmt::skip]
    let expected = vec![
        10, 10, 20, 20,
        10, 10, 20, 20,
        30, 30, 40, 40,
        30, 30, 40, 40,
    ];
    assert_eq!(output.data(), expected.as_slice());
}

#[test]
fn process_requires_parameters_and_load() {
    let backend = Arc::new(StubBackend::new(2000));
    let mut engine = EngineHandle::new(backend, Device::Gpu(0), false).unwrap();
    let input = ImageBuffer::zeroed(2, 2, 3).unwrap();
    let mut output = ImageBuffer::zeroed(8, 8, 3).unwrap();

    assert!(matches!(engine.process(&input, &mut output), Err(Error::NotConfigured)));

    engine.set_parameters(0, 4);
    assert!(matches!(engine.process(&input, &mut output), Err(Error::NotLoaded)));

    let err = engine.load("corrupt.param", "corrupt.bin").unwrap_err();
    assert_eq!(err.status_code(), Some(-1));
    assert!(!engine.is_loaded());
    assert!(matches!(engine.process(&input, &mut output), Err(Error::NotLoaded)));

    engine.load("x.param", "x.bin").unwrap();
    engine.process(&input, &mut output).unwrap();
}

#[test]
fn process_rejects_wrong_output_shape() {
    let backend = Arc::new(StubBackend::new(2000));
    let engine = ready_engine(backend, 4);
    let input = ImageBuffer::zeroed(2, 2, 3).unwrap();

    let mut too_small = ImageBuffer::zeroed(4, 4, 3).unwrap();
    let err = engine.process(&input, &mut too_small).unwrap_err();
    assert!(matches!(
        err,
        Error::OutputSizeMismatch {
            expected: (8, 8, 3),
            actual: (4, 4, 3)
        }
    ));

    let mut wrong_channels = ImageBuffer::zeroed(8, 8, 4).unwrap();
    assert!(engine.process(&input, &mut wrong_channels).is_err());
}

#[test]
fn process_failure_carries_status() {
    let mut stub = StubBackend::new(2000);
    stub.process_status = -100;
    let engine = ready_engine(Arc::new(stub), 2);
    let input = ImageBuffer::zeroed(1, 1, 3).unwrap();
    let mut output = ImageBuffer::zeroed(2, 2, 3).unwrap();
    let err = engine.process(&input, &mut output).unwrap_err();
    assert!(matches!(err, Error::ProcessFailed(-100)));
}

#[test]
fn instance_lifecycle_ordering() {
    let backend = Arc::new(StubBackend::new(2000));
    assert_eq!(get_gpu_count(&*backend), 2);
    assert_eq!(get_default_gpu_index(&*backend), 0);

    create_gpu_instance(&*backend).unwrap();
    assert!(matches!(
        create_gpu_instance(&*backend),
        Err(Error::InstanceAlreadyCreated)
    ));

    let engine = EngineHandle::new(backend.clone(), Device::Gpu(0), false).unwrap();
    assert!(matches!(
        destroy_gpu_instance(&*backend),
        Err(Error::InstanceInUse { live_handles: 1 })
    ));
    assert_eq!(backend.instance_destroys.load(Ordering::SeqCst), 0);

    drop(engine);
    assert_eq!(backend.sessions_destroyed.load(Ordering::SeqCst), 1);
    destroy_gpu_instance(&*backend).unwrap();
    assert_eq!(backend.instance_destroys.load(Ordering::SeqCst), 1);
    assert!(!backend.state.is_created());

    create_gpu_instance(&*backend).unwrap();
}

#[test]
fn failed_instance_create_can_retry() {
    let mut stub = StubBackend::new(2000);
    stub.create_instance_status = -1;
    let err = create_gpu_instance(&stub).unwrap_err();
    assert_eq!(err.status_code(), Some(-1));
    assert!(!stub.state.is_created());

    stub.create_instance_status = 0;
    create_gpu_instance(&stub).unwrap();
}

#[test]
fn gpu_instance_guard_destroys_on_drop() {
    let backend = StubBackend::new(2000);
    {
        let _instance = GpuInstance::create(&backend).unwrap();
        assert!(backend.state.is_created());
    }
    assert!(!backend.state.is_created());
    assert_eq!(backend.instance_destroys.load(Ordering::SeqCst), 1);
}

#[test]
fn upscaler_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("test-x2.param"), b"7767517\n").unwrap();
    std::fs::write(dir.path().join("test-x2.bin"), [0u8; 16]).unwrap();

    let config = UpscalerConfig {
        scale: 2,
        model_dir: dir.path().to_path_buf(),
        model: "test-x2".into(),
        ..Default::default()
    };
    let backend = Arc::new(StubBackend::new(300));
    let upscaler = Upscaler::new(backend, config).unwrap();
    assert_eq!(upscaler.engine().parameters().unwrap().tile_size, 64);

    let rgba = [1u8, 2, 3, 4];
    let out = upscaler.upscale(&rgba, 1, 1).unwrap();
    assert_eq!(out.shape(), (2, 2, 4));
    assert_eq!(out.data(), &[1, 2, 3, 4, 1, 2, 3, 4, 1, 2, 3, 4, 1, 2, 3, 4]);

    assert!(matches!(
        upscaler.upscale(&[0u8; 5], 2, 1),
        Err(Error::InvalidBufferSize { .. })
    ));
}

#[test]
fn upscaler_mask_quantizes_to_bytes() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("mask-x2.param"), b"7767517\n").unwrap();
    std::fs::write(dir.path().join("mask-x2.bin"), [0u8; 16]).unwrap();

    let config = UpscalerConfig {
        scale: 2,
        model_dir: dir.path().to_path_buf(),
        model: "mask-x2".into(),
        ..Default::default()
    };
    let upscaler = Upscaler::new(Arc::new(StubBackend::new(2000)), config).unwrap();

    let mask = [0.0f32, 0.5, 1.0, 0.25];
    let out = upscaler.upscale_mask(&mask, 2, 2).unwrap();
    assert_eq!(out.len(), 16);
    // top-left source pixel covers the first two columns of the first two rows
    assert_eq!(out[0], 0.0);
    assert_eq!(out[2], 127.0 / 255.0);
    assert_eq!(out[8], 1.0);
    assert_eq!(out[10], 63.0 / 255.0);
    assert_eq!(out[15], 63.0 / 255.0);

    // out-of-range values clamp instead of wrapping
    let out = upscaler.upscale_mask(&[-0.5, 1.5], 2, 1).unwrap();
    assert_eq!(&out[..4], &[0.0, 0.0, 1.0, 1.0]);

    assert!(matches!(
        upscaler.upscale_mask(&[0.0; 8], 2, 2),
        Err(Error::InvalidBufferSize { expected: 4, actual: 8 })
    ));
}

#[test]
fn upscaler_missing_model() {
    let dir = tempfile::tempdir().unwrap();
    let config = UpscalerConfig {
        model_dir: dir.path().to_path_buf(),
        ..Default::default()
    };
    let backend = Arc::new(StubBackend::new(2000));
    match Upscaler::new(backend.clone(), config) {
        Err(Error::ModelNotFound(path)) => assert!(path.ends_with("RealESRGAN_General_WDN_x4_v3.param")),
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_) => panic!("model should be missing"),
    }
    assert_eq!(backend.state.live_handles(), 0);
}

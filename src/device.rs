//! Half-SPORT devices and the application-facing API

use core::{
    cell::RefCell,
    future::Future,
    pin::{pin, Pin},
    task::{Context, Poll},
};

use critical_section::Mutex;

use crate::{
    config::{
        ClockConfig, DataFormat, DeviceConfig, Direction, FrameSyncConfig, StaticConfig, TimerMode,
    },
    dma::{DmaController, DmaFault},
    event::Notification,
    irq::Interrupts,
    ral::{self, sport, Static},
    ring::Ring,
    semaphore::{Pend, Semaphore},
    transfer::{Engine, Notes},
    Error, Events, Result,
};

/// Number of buffers a device can hold at once
pub const BUFFER_COUNT: usize = 2;

/// Number of half-SPORTs managed by a [`Sport`]
pub const HALF_PORTS: usize = 2;

/// A callback that receives [`Notification`]s
///
/// Callbacks run in interrupt context. They may submit buffers.
pub type Callback = &'static (dyn Fn(Notification) + Sync);

/// Lifecycle of a half-SPORT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Not open
    Uninitialized,
    /// Open, no transfer has started
    Initialized,
    /// A transfer is programmed into the hardware
    DataFlowEnabled,
    /// Data flow stopped by the application
    DataFlowDisabled,
    /// Open, and the ring ran dry
    Paused,
}

/// Whether the hardware is engaged with a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TransferMode {
    None,
    NonBlocking,
}

/// The hardware resources of one half-SPORT
#[derive(Debug, Clone, Copy)]
pub struct PortResources {
    /// Base of the half-SPORT register block
    pub registers: *const (),
    /// DMA channel serving this half-SPORT
    pub dma_channel: u8,
    /// SPORT event interrupt
    pub sport_irq: u16,
    /// DMA channel done interrupt
    pub dma_irq: u16,
    /// Configuration applied on open
    pub config: StaticConfig,
}

/// SPORT0 half A on the ADuCM4050
pub const SPORT0A: PortResources = PortResources {
    registers: 0x4003_8000 as *const (),
    dma_channel: 2,
    sport_irq: 49,
    dma_irq: 15,
    config: StaticConfig::DEFAULT,
};

/// SPORT0 half B on the ADuCM4050
pub const SPORT0B: PortResources = PortResources {
    registers: 0x4003_8040 as *const (),
    dma_channel: 3,
    sport_irq: 50,
    dma_irq: 16,
    config: StaticConfig::DEFAULT,
};

/// Mutable state of a half-SPORT that outlives any one device
pub(crate) struct PortState {
    pub config: DeviceConfig,
    pub state: State,
    pub device: Option<&'static DeviceMemory>,
    pub generation: u32,
}

pub(crate) struct HalfPort {
    pub registers: Static<sport::RegisterBlock>,
    pub dma_channel: usize,
    pub sport_irq: u16,
    pub dma_irq: u16,
    pub static_config: StaticConfig,
    pub inner: Mutex<RefCell<PortState>>,
}

impl HalfPort {
    const fn new(resources: PortResources) -> Self {
        HalfPort {
            registers: Static(resources.registers.cast()),
            dma_channel: resources.dma_channel as usize,
            sport_irq: resources.sport_irq,
            dma_irq: resources.dma_irq,
            static_config: resources.config,
            inner: Mutex::new(RefCell::new(PortState {
                config: DeviceConfig::new(),
                state: State::Uninitialized,
                device: None,
                generation: 0,
            })),
        }
    }
}

/// Per-open state of a device
pub(crate) struct Session {
    pub direction: Direction,
    pub callback: Option<Callback>,
    pub ring: Ring<BUFFER_COUNT>,
    pub mode: TransferMode,
    pub hw_error: Events,
}

impl Session {
    fn new(direction: Direction) -> Self {
        Session {
            direction,
            callback: None,
            ring: Ring::new(),
            mode: TransferMode::None,
            hw_error: Events::NONE,
        }
    }
}

/// Memory for one open device
///
/// Allocate this statically, and lend it to [`Sport::open`]. The memory
/// can be reused once the device is closed.
pub struct DeviceMemory {
    pub(crate) session: Mutex<RefCell<Option<Session>>>,
    pub(crate) completions: Semaphore,
}

impl DeviceMemory {
    pub const fn new() -> Self {
        DeviceMemory {
            session: Mutex::new(RefCell::new(None)),
            completions: Semaphore::new(),
        }
    }
}

impl Default for DeviceMemory {
    fn default() -> Self {
        Self::new()
    }
}

/// The SPORT driver
///
/// `Sport` owns the static state of both half-SPORTs. It hands out
/// [`Device`]s, and it provides the interrupt entry points that you call
/// from your interrupt handlers.
///
/// ```no_run
/// use aducm_sport::{DmaController, DeviceMemory, Direction, Nvic, Sport, SPORT0A, SPORT0B};
///
/// static NVIC: Nvic = Nvic;
/// static SPORT: Sport = unsafe {
///     Sport::new(
///         SPORT0A,
///         SPORT0B,
///         DmaController::new(0x4001_0000 as *const (), 0x2000_0000 as *const ()),
///         &NVIC,
///     )
/// };
/// static MEMORY: DeviceMemory = DeviceMemory::new();
///
/// // #[cortex_m_rt::interrupt]
/// fn SPORT_A_EVT() {
///     SPORT.on_interrupt(0);
/// }
///
/// let rx = SPORT.open(0, Direction::Rx, &MEMORY).unwrap();
/// ```
pub struct Sport {
    ports: [HalfPort; HALF_PORTS],
    pub(crate) dma: DmaController,
    pub(crate) interrupts: &'static (dyn Interrupts + Sync),
}

// Safety: OK to allocate a SPORT driver in a static context. Shared
// state is only touched inside critical sections.
unsafe impl Sync for Sport {}

impl Sport {
    /// Create the SPORT driver
    ///
    /// # Safety
    ///
    /// The register pointers in `half_a` and `half_b` must point at the
    /// half-SPORT register blocks, and their DMA channels must be valid for
    /// `dma`. No other code may drive those registers or DMA channels.
    pub const unsafe fn new(
        half_a: PortResources,
        half_b: PortResources,
        dma: DmaController,
        interrupts: &'static (dyn Interrupts + Sync),
    ) -> Self {
        Sport {
            ports: [HalfPort::new(half_a), HalfPort::new(half_b)],
            dma,
            interrupts,
        }
    }

    /// Open half-SPORT `port` for transfers in `direction`
    ///
    /// The device keeps `memory` until it's closed. Fails if `port`
    /// doesn't exist, if the half-SPORT is already open, or if `memory`
    /// backs another open device.
    pub fn open(
        &'static self,
        port: usize,
        direction: Direction,
        memory: &'static DeviceMemory,
    ) -> Result<Device> {
        let half = self.ports.get(port).ok_or(Error::InvalidDeviceNum)?;
        let config = DeviceConfig::open(direction, &half.static_config)?;
        self.dma.init();

        let generation = critical_section::with(|cs| {
            let mut state = half.inner.borrow_ref_mut(cs);
            if state.device.is_some() {
                return Err(Error::DeviceInUse);
            }
            let mut session = memory.session.borrow_ref_mut(cs);
            if session.is_some() {
                return Err(Error::DeviceInUse);
            }
            *session = Some(Session::new(direction));
            memory.completions.reset();

            state.config = config;
            config.write_divisors(&half.registers);
            state.state = State::Initialized;
            state.device = Some(memory);
            state.generation = state.generation.wrapping_add(1);
            Ok(state.generation)
        })?;

        log::debug!("SPORT half {} open for {:?}", port, direction);
        Ok(Device {
            sport: self,
            port,
            memory,
            generation,
        })
    }

    pub(crate) fn port(&self, port: usize) -> Option<&HalfPort> {
        self.ports.get(port)
    }

    /// Run `f` against the open device of `port`, then deliver the
    /// notifications it produced
    ///
    /// With `expect`, the open device must match that memory and
    /// generation. Callbacks run after the critical section ends.
    pub(crate) fn dispatch<R>(
        &self,
        port: usize,
        expect: Option<(&DeviceMemory, u32)>,
        f: impl FnOnce(&mut Engine<'_>) -> Result<R>,
    ) -> Result<R> {
        let half = self.ports.get(port).ok_or(Error::InvalidHandle)?;
        let mut notes = Notes::new();
        let (result, callback) = critical_section::with(|cs| {
            let mut state = half.inner.borrow_ref_mut(cs);
            let memory = state.device.ok_or(Error::InvalidHandle)?;
            if let Some((expected, generation)) = expect {
                if !core::ptr::eq(memory, expected) || state.generation != generation {
                    return Err(Error::InvalidHandle);
                }
            }
            let mut session = memory.session.borrow_ref_mut(cs);
            let session = session.as_mut().ok_or(Error::InvalidHandle)?;
            let callback = session.callback;
            let mut engine = Engine {
                regs: &half.registers,
                port: half,
                dma: &self.dma,
                interrupts: self.interrupts,
                state: &mut state,
                session,
                completions: &memory.completions,
                notes: &mut notes,
            };
            Ok((f(&mut engine), callback))
        })?;
        if let Some(callback) = callback {
            for note in notes {
                callback(note);
            }
        }
        result
    }

    /// Handle a SPORT interrupt for half-SPORT `port`
    ///
    /// Call this from the half-SPORT's event interrupt handler. It moves
    /// data for core-driven transfers, reports errors, and retires
    /// finished buffers.
    pub fn on_interrupt(&self, port: usize) {
        let _ = self.dispatch(port, None, |engine| {
            engine.on_sport_interrupt();
            Ok(())
        });
        crate::cycles::sample();
    }

    /// Handle the DMA done interrupt for half-SPORT `port`
    ///
    /// Only receive transfers complete here. Transmit transfers complete
    /// when the SPORT reports that the last word left the shift register.
    pub fn on_dma_interrupt(&self, port: usize) {
        let _ = self.dispatch(port, None, |engine| {
            engine.on_dma_done();
            Ok(())
        });
        crate::cycles::sample();
    }

    /// Handle a DMA fault on the channel serving half-SPORT `port`
    ///
    /// The in-flight buffer, and every queued DMA buffer behind it, is
    /// retired as failed.
    pub fn on_dma_error(&self, port: usize, fault: DmaFault) {
        let _ = self.dispatch(port, None, |engine| {
            engine.on_dma_fault(fault);
            Ok(())
        });
        crate::cycles::sample();
    }

    /// Handle the DMA controller's error interrupt
    ///
    /// Checks the DMA channels of both half-SPORTs, clears their fault
    /// flags, and forwards each fault to [`on_dma_error`](Self::on_dma_error).
    pub fn on_dma_error_interrupt(&self) {
        for (port, half) in self.ports.iter().enumerate() {
            if let Some(fault) = self.dma.take_fault(half.dma_channel) {
                self.on_dma_error(port, fault);
            }
        }
    }
}

/// A handle to an open half-SPORT
///
/// Handles are cheap to copy, so a callback can capture one to resubmit
/// buffers. Once the device is closed, every copy fails with
/// [`Error::InvalidHandle`].
#[derive(Clone, Copy)]
pub struct Device {
    sport: &'static Sport,
    port: usize,
    memory: &'static DeviceMemory,
    generation: u32,
}

impl Device {
    fn with<R>(&self, f: impl FnOnce(&mut Engine<'_>) -> Result<R>) -> Result<R> {
        self.sport
            .dispatch(self.port, Some((self.memory, self.generation)), f)
    }

    /// Returns the half-SPORT index
    pub fn port(&self) -> usize {
        self.port
    }

    /// Returns the lifecycle state of the half-SPORT
    pub fn state(&self) -> Result<State> {
        self.with(|engine| Ok(engine.state.state))
    }

    /// Close the device
    ///
    /// Any buffers still in the ring are abandoned without notification.
    /// The device memory may be reused afterwards.
    pub fn close(self) -> Result<()> {
        let half = self.sport.port(self.port).ok_or(Error::InvalidHandle)?;
        critical_section::with(|cs| {
            let mut state = half.inner.borrow_ref_mut(cs);
            match state.device {
                Some(memory)
                    if core::ptr::eq(memory, self.memory)
                        && state.generation == self.generation => {}
                _ => return Err(Error::InvalidHandle),
            }
            self.sport.interrupts.disable(half.sport_irq);
            self.sport.interrupts.disable(half.dma_irq);
            state.state = State::Uninitialized;
            state.device = None;
            self.memory.session.borrow_ref_mut(cs).take();
            self.memory.completions.reset();
            self.sport.dma.disable(half.dma_channel);
            ral::write_reg!(crate::ral::sport, half.registers, IEN, 0);
            ral::write_reg!(crate::ral::sport, half.registers, CTL, 0);
            Ok(())
        })?;
        log::debug!("SPORT half {} closed", self.port);
        Ok(())
    }

    /// Queue `buffer` for transfer
    ///
    /// With `dma`, the DMA controller moves the data. Otherwise, the
    /// interrupt handler moves one word at a time.
    ///
    /// DMA buffers must be a whole number of DMA transfers, aligned to
    /// the transfer width, and within the DMA and SPORT count limits.
    /// Core-driven buffers must be a multiple of four bytes. On error,
    /// the buffer comes back with the error.
    pub fn submit_buffer(
        &self,
        buffer: &'static mut [u8],
        dma: bool,
    ) -> core::result::Result<(), (Error, &'static mut [u8])> {
        let mut pending = Some(buffer);
        let result = self.with(|engine| engine.enqueue(&mut pending, dma));
        match (result, pending) {
            (Err(error), Some(buffer)) => Err((error, buffer)),
            _ => Ok(()),
        }
    }

    /// Wait for the next processed buffer
    ///
    /// Blocks until a buffer retires. The returned [`Processed`] carries
    /// any hardware errors seen since the last call. Fails immediately if
    /// a callback is registered.
    pub fn get_buffer(&self) -> Result<Processed> {
        crate::block(pin!(self.wait_buffer()))
    }

    /// A future that resolves to the next processed buffer
    ///
    /// This is the asynchronous form of [`get_buffer`](Self::get_buffer).
    pub fn wait_buffer(&self) -> WaitBuffer {
        WaitBuffer {
            device: *self,
            pend: self.memory.completions.pend(),
        }
    }

    /// Returns `true` if a processed buffer is ready for
    /// [`get_buffer`](Self::get_buffer)
    ///
    /// Fails if a callback is registered, or if there is no buffer in the
    /// ring to check.
    pub fn is_buffer_available(&self) -> Result<bool> {
        self.with(|engine| {
            let session = &engine.session;
            if session.callback.is_some() || !session.ring.has_active() {
                return Err(Error::OperationNotAllowed);
            }
            Ok(session.ring.peek())
        })
    }

    /// Register, or with `None` remove, the notification callback
    ///
    /// Not allowed while data flows, or while a processed buffer waits
    /// for [`get_buffer`](Self::get_buffer).
    pub fn register_callback(&self, callback: Option<Callback>) -> Result<()> {
        self.with(|engine| {
            engine.ensure_stopped()?;
            if engine.session.ring.has_active() {
                return Err(Error::OperationNotAllowed);
            }
            engine.session.callback = callback;
            Ok(())
        })
    }

    /// Set the serial word format
    pub fn config_data(&self, format: &DataFormat) -> Result<()> {
        self.with(|engine| {
            engine.ensure_stopped()?;
            engine.state.config.set_data_format(format)
        })
    }

    /// Set the serial clock; the divisor takes effect immediately
    pub fn config_clock(&self, clock: &ClockConfig) -> Result<()> {
        self.with(|engine| {
            engine.ensure_stopped()?;
            engine.state.config.set_clock(clock);
            engine.state.config.write_divisors(engine.regs);
            Ok(())
        })
    }

    /// Set the frame sync; the divisor takes effect immediately
    pub fn config_frame_sync(&self, frame_sync: &FrameSyncConfig) -> Result<()> {
        self.with(|engine| {
            engine.ensure_stopped()?;
            engine.state.config.set_frame_sync(frame_sync);
            engine.state.config.write_divisors(engine.regs);
            Ok(())
        })
    }

    /// Use the other half-SPORT's frame sync and/or clock
    pub fn multiplex_sport_signal(&self, frame_sync: bool, clock: bool) -> Result<()> {
        self.with(|engine| {
            engine.ensure_stopped()?;
            engine.state.config.set_multiplex(frame_sync, clock);
            Ok(())
        })
    }

    /// Enable timer mode with the given CONVT timing
    pub fn config_timer_mode(&self, timer: &TimerMode) -> Result<()> {
        self.with(|engine| {
            engine.ensure_stopped()?;
            engine.state.config.set_timer_mode(timer)?;
            engine.state.config.write_divisors(engine.regs);
            Ok(())
        })
    }
}

/// A buffer returned by [`Device::get_buffer`]
#[derive(Debug)]
pub struct Processed {
    buffer: &'static mut [u8],
    events: Events,
}

impl Processed {
    /// Hardware errors accumulated since the last retrieval
    pub fn events(&self) -> Events {
        self.events
    }

    /// `Ok` if no hardware errors accumulated, otherwise
    /// [`Error::HwError`]
    pub fn status(&self) -> Result<()> {
        if self.events.is_empty() {
            Ok(())
        } else {
            Err(Error::HwError(self.events))
        }
    }

    pub fn buffer(&self) -> &[u8] {
        self.buffer
    }

    /// Take back ownership of the buffer
    pub fn into_buffer(self) -> &'static mut [u8] {
        self.buffer
    }
}

/// Resolves to the next processed buffer
///
/// Use [`Device::wait_buffer`] to create this future.
pub struct WaitBuffer {
    device: Device,
    pend: Pend<'static>,
}

impl Future for WaitBuffer {
    type Output = Result<Processed>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let device = self.device;
        let blocking = device.with(|engine| {
            if engine.session.callback.is_some() {
                Err(Error::Failed)
            } else {
                Ok(())
            }
        });
        if let Err(err) = blocking {
            return Poll::Ready(Err(err));
        }
        loop {
            if Pin::new(&mut self.pend).poll(cx).is_pending() {
                return Poll::Pending;
            }
            let retrieved = device.with(|engine| {
                let hw_error = &mut engine.session.hw_error;
                Ok(match engine.session.ring.dequeue() {
                    Some((buffer, events)) => Some(Ok(Processed {
                        buffer: buffer.into_slice(),
                        events: events | hw_error.take(),
                    })),
                    // Woken by an error while no buffer was in flight.
                    None if !hw_error.is_empty() => {
                        Some(Err(Error::HwError(hw_error.take())))
                    }
                    None => None,
                })
            });
            if let Some(result) = retrieved? {
                return Poll::Ready(result);
            }
        }
    }
}

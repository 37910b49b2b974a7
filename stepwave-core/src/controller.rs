//! Lifecycle controller
//!
//! Owns the instance state table and the peripherals, and drives each
//! instance through `init → start ⇄ stop → uninit`. Every operation takes
//! `&self` so a controller can live in a `static` and be called from both
//! thread mode and interrupt handlers.
//!
//! Locks are always taken in the order slot → pin table → peripherals.
//! Only `init` and `uninit` touch the pin table.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use stepwave_hal::{GpioPort, Level};

use crate::config::{BoardConfig, Instance, MotorConfig};
use crate::error::StepperError;
use crate::table::{InstanceState, Lifecycle, PinTable};
use crate::traits::PulseBackend;

/// Speed programmed when `init` is given zero RPM
pub const MIN_INIT_RPM: f32 = 1.0;

type Slot<M, P> = Mutex<M, RefCell<InstanceState<P>>>;

/// Backend and GPIO port, guarded together
struct Peripherals<B, G> {
    backend: B,
    gpio: G,
}

impl<B: PulseBackend, G: GpioPort> Peripherals<B, G> {
    /// Drive every direction pin to the configured level
    fn drive_direction(&mut self, config: &MotorConfig) -> Result<(), StepperError> {
        let level = Level::from(config.direction);
        for pin in config.direction_pins() {
            self.gpio
                .set_level(pin, level)
                .map_err(|_| StepperError::InternalError)?;
        }
        Ok(())
    }

    /// Drive every pin of the instance low
    fn idle_pins(&mut self, config: &MotorConfig) -> Result<(), StepperError> {
        for pin in config.all_pins() {
            self.gpio
                .set_low(pin)
                .map_err(|_| StepperError::InternalError)?;
        }
        Ok(())
    }
}

/// Stepper lifecycle controller for a pool of `N` instances
///
/// `M` selects the locking strategy: `CriticalSectionRawMutex` when
/// interrupt handlers call in, `NoopRawMutex` for single-context use.
pub struct StepperController<M: RawMutex, B: PulseBackend, G: GpioPort, const N: usize> {
    slots: [Slot<M, B::Params>; N],
    pins: Mutex<M, RefCell<PinTable<N>>>,
    hw: Mutex<M, RefCell<Peripherals<B, G>>>,
}

impl<M: RawMutex, B: PulseBackend, G: GpioPort, const N: usize> StepperController<M, B, G, N> {
    /// Create a controller with every slot parked
    pub const fn new(backend: B, gpio: G) -> Self {
        Self {
            slots: [const { Mutex::new(RefCell::new(InstanceState::new())) }; N],
            pins: Mutex::new(RefCell::new(PinTable::new())),
            hw: Mutex::new(RefCell::new(Peripherals { backend, gpio })),
        }
    }

    /// Number of slots in the pool
    pub const fn capacity(&self) -> usize {
        N
    }

    fn slot(&self, instance: Instance) -> Result<&Slot<M, B::Params>, StepperError> {
        self.slots
            .get(instance.index())
            .ok_or(StepperError::InvalidParameters)
    }

    /// Configure an instance and program its peripheral
    ///
    /// The output is left stopped; call [`start`](Self::start) to emit
    /// pulses. Zero RPM is raised to [`MIN_INIT_RPM`].
    pub fn init(&self, instance: Instance, config: &MotorConfig) -> Result<(), StepperError> {
        let slot = self.slot(instance)?;

        slot.lock(|slot| {
            let mut slot = slot.borrow_mut();
            if slot.lifecycle.initialized() {
                return Err(StepperError::InvalidState);
            }
            config.validate(B::MAX_PIN_PAIRS)?;

            let mut config = config.clone();
            if config.rpm <= 0.0 {
                config.rpm = MIN_INIT_RPM;
            }
            let params = B::translate(&config.motion_at(config.rpm))?;
            let mask = config.pin_mask();

            self.pins.lock(|pins| {
                let mut pins = pins.borrow_mut();
                if pins.conflicts(instance.index(), mask) {
                    return Err(StepperError::InvalidParameters);
                }

                self.hw.lock(|hw| {
                    let mut hw = hw.borrow_mut();
                    if instance.index() >= hw.backend.capacity() {
                        return Err(StepperError::InvalidParameters);
                    }
                    hw.gpio
                        .configure_outputs(pins.output_mask().union(mask))
                        .map_err(|_| StepperError::InvalidParameters)?;
                    hw.drive_direction(&config)?;
                    hw.backend.configure(instance, &config, &params)
                })?;

                pins.assign(instance.index(), mask);
                Ok(())
            })?;

            #[cfg(feature = "defmt")]
            defmt::debug!(
                "stepper {}: init {} pulses/rev at {} rpm",
                instance.0,
                config.subdivision,
                config.rpm
            );

            slot.config = config;
            slot.lifecycle = Lifecycle::Stopped;
            slot.applied = Some(params);
            Ok(())
        })
    }

    /// Initialize every channel of a board, stopping at the first failure
    pub fn init_board(&self, board: &BoardConfig) -> Result<(), StepperError> {
        board
            .channels
            .iter()
            .try_for_each(|channel| self.init(channel.instance, &channel.motor))
    }

    /// Tear down an instance and return its slot to the parked defaults
    ///
    /// Pauses and releases the peripheral, idles the pins and frees them
    /// for other instances. A slot that was never initialized is just
    /// reset.
    pub fn uninit(&self, instance: Instance) -> Result<(), StepperError> {
        let slot = self.slot(instance)?;

        slot.lock(|slot| {
            let mut slot = slot.borrow_mut();
            if slot.lifecycle.initialized() {
                self.pins.lock(|pins| {
                    let mut pins = pins.borrow_mut();
                    self.hw.lock(|hw| {
                        let mut hw = hw.borrow_mut();
                        hw.backend.pause(instance)?;
                        slot.lifecycle = Lifecycle::Stopped;
                        hw.backend.release(instance)?;
                        slot.applied = None;
                        hw.idle_pins(&slot.config)
                    })?;
                    pins.clear(instance.index());
                    Ok::<(), StepperError>(())
                })?;

                #[cfg(feature = "defmt")]
                defmt::debug!("stepper {}: released", instance.0);
            }

            slot.reset();
            Ok(())
        })
    }

    /// Change the speed of an initialized instance
    ///
    /// A rate below the backend's minimum frequency stops the instance
    /// and keeps the stored speed. Otherwise the peripheral is
    /// reprogrammed and the run state is preserved. The stored speed is
    /// only overwritten once the new rate is programmed.
    pub fn update_rpm(&self, instance: Instance, rpm: f32) -> Result<(), StepperError> {
        let slot = self.slot(instance)?;
        if !rpm.is_finite() || rpm < 0.0 {
            return Err(StepperError::InvalidParameters);
        }

        slot.lock(|slot| {
            let mut slot = slot.borrow_mut();
            if !slot.lifecycle.initialized() {
                return Err(StepperError::InvalidState);
            }

            let motion = slot.config.motion_at(rpm);
            if motion.frequency_hz() < B::MIN_FREQUENCY_HZ {
                #[cfg(feature = "defmt")]
                defmt::debug!("stepper {}: {} rpm is below threshold, stopping", instance.0, rpm);
                return self.halt(instance, &mut slot);
            }

            let next = B::translate(&motion)?;
            let running = slot.lifecycle.running();

            let result: Result<(), StepperError> = self.hw.lock(|hw| {
                let mut hw = hw.borrow_mut();
                match slot.applied {
                    Some(previous) => hw.backend.update(instance, &previous, &next, running),
                    // Binding lost by an earlier failure
                    None => {
                        hw.backend.configure(instance, &slot.config, &next)?;
                        if running {
                            hw.backend.resume(instance)?;
                        }
                        Ok(())
                    }
                }
            });

            if let Err(error) = result {
                if !error.is_validation() {
                    self.resync(instance, &mut slot, running);
                }
                return Err(error);
            }

            #[cfg(feature = "defmt")]
            defmt::trace!("stepper {}: {} rpm", instance.0, rpm);

            slot.applied = Some(next);
            slot.config.rpm = rpm;
            Ok(())
        })
    }

    /// Set the direction flag
    ///
    /// The level is driven onto every direction pin when the instance is
    /// initialized; otherwise it is only stored.
    pub fn update_direction(&self, instance: Instance, direction: bool) -> Result<(), StepperError> {
        let slot = self.slot(instance)?;

        slot.lock(|slot| {
            let mut slot = slot.borrow_mut();
            slot.config.direction = direction;
            if slot.lifecycle.initialized() {
                self.hw
                    .lock(|hw| hw.borrow_mut().drive_direction(&slot.config))?;
            }
            Ok(())
        })
    }

    /// Start pulse generation
    ///
    /// Re-drives the direction pins first, since [`stop`](Self::stop)
    /// leaves them low.
    pub fn start(&self, instance: Instance) -> Result<(), StepperError> {
        let slot = self.slot(instance)?;

        slot.lock(|slot| {
            let mut slot = slot.borrow_mut();
            if !slot.lifecycle.initialized() {
                return Err(StepperError::InvalidState);
            }

            self.hw.lock(|hw| {
                let mut hw = hw.borrow_mut();
                hw.drive_direction(&slot.config)?;
                hw.backend.resume(instance)
            })?;

            #[cfg(feature = "defmt")]
            defmt::debug!("stepper {}: running", instance.0);

            slot.lifecycle = Lifecycle::Running;
            Ok(())
        })
    }

    /// Stop pulse generation and idle the pins
    ///
    /// Stopping an instance that was never initialized succeeds without
    /// touching hardware.
    pub fn stop(&self, instance: Instance) -> Result<(), StepperError> {
        let slot = self.slot(instance)?;

        slot.lock(|slot| {
            let mut slot = slot.borrow_mut();
            if !slot.lifecycle.initialized() {
                return Ok(());
            }
            self.halt(instance, &mut slot)
        })
    }

    /// Pause the backend and idle pins; the slot lock must be held
    fn halt(
        &self,
        instance: Instance,
        slot: &mut InstanceState<B::Params>,
    ) -> Result<(), StepperError> {
        self.hw.lock(|hw| {
            let mut hw = hw.borrow_mut();
            hw.backend.pause(instance)?;
            slot.lifecycle = Lifecycle::Stopped;
            hw.idle_pins(&slot.config)
        })?;

        #[cfg(feature = "defmt")]
        defmt::debug!("stepper {}: stopped", instance.0);

        Ok(())
    }

    /// Align the slot with the peripheral after a failed reprogram
    ///
    /// The record takes whatever parameters the backend reports. An
    /// instance that was running but no longer emits is stopped.
    fn resync(&self, instance: Instance, slot: &mut InstanceState<B::Params>, running: bool) {
        let (programmed, emitting) = self.hw.lock(|hw| {
            let hw = hw.borrow();
            (hw.backend.programmed(instance), hw.backend.emitting(instance))
        });
        slot.applied = programmed;

        if running && !emitting {
            #[cfg(feature = "defmt")]
            defmt::warn!("stepper {}: output lost during update, stopping", instance.0);

            // Pins are idled best effort; the output is already silent
            let _ = self.halt(instance, slot);
            slot.lifecycle = Lifecycle::Stopped;
        }
    }

    /// Snapshot of an instance's record
    pub fn state(&self, instance: Instance) -> Result<InstanceState<B::Params>, StepperError> {
        let slot = self.slot(instance)?;
        Ok(slot.lock(|slot| slot.borrow().clone()))
    }

    /// Lifecycle state of an instance
    pub fn lifecycle(&self, instance: Instance) -> Result<Lifecycle, StepperError> {
        let slot = self.slot(instance)?;
        Ok(slot.lock(|slot| slot.borrow().lifecycle))
    }

    /// Run `f` with exclusive access to the backend and GPIO port
    pub fn with_peripherals<R>(&self, f: impl FnOnce(&mut B, &mut G) -> R) -> R {
        self.hw.lock(|hw| {
            let mut hw = hw.borrow_mut();
            let hw = &mut *hw;
            f(&mut hw.backend, &mut hw.gpio)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PinPair;
    use crate::pulse::Motion;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use heapless::Vec;
    use stepwave_hal::{Pin, PinMask};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        Configure(u8, u32),
        Update(u8, u32, u32, bool),
        Pause(u8),
        Resume(u8),
        Release(u8),
    }

    /// Backend whose parameters are just the pulse frequency
    #[derive(Default)]
    struct FakeBackend {
        calls: Vec<Call, 32>,
        programmed: [Option<u32>; 3],
        emitting: [bool; 3],
        fail_pause: bool,
        /// Fail updates after the output was paused and cleared
        fail_update: bool,
    }

    impl PulseBackend for FakeBackend {
        type Params = u32;
        const MAX_PIN_PAIRS: usize = 2;
        const MIN_FREQUENCY_HZ: u32 = 10;

        fn capacity(&self) -> usize {
            3
        }

        fn translate(motion: &Motion) -> Result<u32, StepperError> {
            match motion.frequency_hz() {
                0 | 100_001.. => Err(StepperError::FrequencyUpdateError),
                hz => Ok(hz),
            }
        }

        fn configure(
            &mut self,
            instance: Instance,
            _config: &MotorConfig,
            params: &u32,
        ) -> Result<(), StepperError> {
            let _ = self.calls.push(Call::Configure(instance.0, *params));
            self.programmed[instance.index()] = Some(*params);
            self.emitting[instance.index()] = false;
            Ok(())
        }

        fn update(
            &mut self,
            instance: Instance,
            previous: &u32,
            next: &u32,
            running: bool,
        ) -> Result<(), StepperError> {
            let _ = self
                .calls
                .push(Call::Update(instance.0, *previous, *next, running));
            if self.fail_update {
                self.programmed[instance.index()] = None;
                self.emitting[instance.index()] = false;
                return Err(StepperError::InternalError);
            }
            self.programmed[instance.index()] = Some(*next);
            Ok(())
        }

        fn pause(&mut self, instance: Instance) -> Result<(), StepperError> {
            if self.fail_pause {
                return Err(StepperError::InternalError);
            }
            let _ = self.calls.push(Call::Pause(instance.0));
            self.emitting[instance.index()] = false;
            Ok(())
        }

        fn resume(&mut self, instance: Instance) -> Result<(), StepperError> {
            let _ = self.calls.push(Call::Resume(instance.0));
            self.emitting[instance.index()] = true;
            Ok(())
        }

        fn release(&mut self, instance: Instance) -> Result<(), StepperError> {
            let _ = self.calls.push(Call::Release(instance.0));
            self.programmed[instance.index()] = None;
            Ok(())
        }

        fn programmed(&self, instance: Instance) -> Option<u32> {
            self.programmed[instance.index()]
        }

        fn emitting(&self, instance: Instance) -> bool {
            self.emitting[instance.index()]
        }
    }

    struct FakeGpio {
        outputs: PinMask,
        levels: [Option<Level>; 64],
        reject: bool,
    }

    impl Default for FakeGpio {
        fn default() -> Self {
            Self {
                outputs: PinMask::EMPTY,
                levels: [None; 64],
                reject: false,
            }
        }
    }

    impl GpioPort for FakeGpio {
        type Error = ();

        fn configure_outputs(&mut self, mask: PinMask) -> Result<(), ()> {
            if self.reject {
                return Err(());
            }
            self.outputs = mask;
            Ok(())
        }

        fn set_level(&mut self, pin: Pin, level: Level) -> Result<(), ()> {
            self.levels[pin.0 as usize] = Some(level);
            Ok(())
        }
    }

    type Controller = StepperController<NoopRawMutex, FakeBackend, FakeGpio, 4>;

    fn controller() -> Controller {
        StepperController::new(FakeBackend::default(), FakeGpio::default())
    }

    fn calls(ctl: &Controller) -> Vec<Call, 32> {
        ctl.with_peripherals(|backend, _| backend.calls.clone())
    }

    fn level(ctl: &Controller, pin: u8) -> Option<Level> {
        ctl.with_peripherals(|_, gpio| gpio.levels[pin as usize])
    }

    #[test]
    fn test_new_controller_is_parked() {
        let ctl = controller();
        assert_eq!(ctl.capacity(), 4);
        for id in 0..4 {
            let state = ctl.state(Instance(id)).unwrap();
            assert_eq!(state.lifecycle(), Lifecycle::Uninitialized);
            assert_eq!(state.config(), &MotorConfig::parked());
        }
    }

    #[test]
    fn test_init_programs_peripheral() {
        let ctl = controller();
        let config = MotorConfig::new(Pin(4), Pin(5)).with_direction(true);
        ctl.init(Instance(0), &config).unwrap();

        let state = ctl.state(Instance(0)).unwrap();
        assert_eq!(state.lifecycle(), Lifecycle::Stopped);
        assert_eq!(state.applied(), Some(&533));
        assert_eq!(state.config(), &config);

        assert_eq!(calls(&ctl).as_slice(), &[Call::Configure(0, 533)]);
        assert_eq!(level(&ctl, 4), Some(Level::High));
        let outputs = ctl.with_peripherals(|_, gpio| gpio.outputs);
        assert!(outputs.contains(Pin(4)) && outputs.contains(Pin(5)));
    }

    #[test]
    fn test_init_twice_keeps_first_config() {
        let ctl = controller();
        let first = MotorConfig::new(Pin(1), Pin(2));
        ctl.init(Instance(0), &first).unwrap();

        let second = MotorConfig::new(Pin(7), Pin(8)).with_rpm(60.0);
        assert_eq!(ctl.init(Instance(0), &second), Err(StepperError::InvalidState));
        assert_eq!(ctl.state(Instance(0)).unwrap().config(), &first);
        assert_eq!(calls(&ctl).len(), 1);
    }

    #[test]
    fn test_init_out_of_range_touches_nothing() {
        let ctl = controller();
        let config = MotorConfig::new(Pin(1), Pin(2));

        // Beyond the pool
        assert_eq!(ctl.init(Instance(4), &config), Err(StepperError::InvalidParameters));
        // Inside the pool but beyond the peripheral
        assert_eq!(ctl.init(Instance(3), &config), Err(StepperError::InvalidParameters));

        assert!(calls(&ctl).is_empty());
        assert_eq!(level(&ctl, 1), None);
        assert_eq!(
            ctl.lifecycle(Instance(3)),
            Ok(Lifecycle::Uninitialized)
        );
        assert_eq!(ctl.state(Instance(4)), Err(StepperError::InvalidParameters));
    }

    #[test]
    fn test_init_rejects_pins_of_other_instances() {
        let ctl = controller();
        ctl.init(Instance(0), &MotorConfig::new(Pin(1), Pin(2)))
            .unwrap();

        let clash = MotorConfig::new(Pin(3), Pin(2));
        assert_eq!(ctl.init(Instance(1), &clash), Err(StepperError::InvalidParameters));
        assert_eq!(ctl.lifecycle(Instance(1)), Ok(Lifecycle::Uninitialized));
    }

    #[test]
    fn test_init_rejects_invalid_config() {
        let ctl = controller();
        let too_many = MotorConfig::with_pairs(&[
            PinPair::new(Pin(1), Pin(2)),
            PinPair::new(Pin(3), Pin(4)),
            PinPair::new(Pin(5), Pin(6)),
        ])
        .unwrap();
        assert_eq!(ctl.init(Instance(0), &too_many), Err(StepperError::InvalidParameters));

        let no_pulses = MotorConfig::new(Pin(1), Pin(2)).with_subdivision(0);
        assert_eq!(ctl.init(Instance(0), &no_pulses), Err(StepperError::InvalidParameters));
        assert!(calls(&ctl).is_empty());
    }

    #[test]
    fn test_init_gpio_rejection() {
        let ctl = controller();
        ctl.with_peripherals(|_, gpio| gpio.reject = true);

        let config = MotorConfig::new(Pin(1), Pin(2));
        assert_eq!(ctl.init(Instance(0), &config), Err(StepperError::InvalidParameters));
        assert_eq!(ctl.lifecycle(Instance(0)), Ok(Lifecycle::Uninitialized));

        // Pins were not claimed
        ctl.with_peripherals(|_, gpio| gpio.reject = false);
        ctl.init(Instance(1), &config).unwrap();
    }

    #[test]
    fn test_init_zero_rpm_is_raised() {
        let ctl = controller();
        let config = MotorConfig::new(Pin(1), Pin(2)).with_rpm(0.0);
        ctl.init(Instance(0), &config).unwrap();

        let state = ctl.state(Instance(0)).unwrap();
        assert_eq!(state.config().rpm, MIN_INIT_RPM);
        // 3200 / 60
        assert_eq!(state.applied(), Some(&53));
    }

    #[test]
    fn test_start_and_stop() {
        let ctl = controller();
        assert_eq!(ctl.start(Instance(0)), Err(StepperError::InvalidState));
        assert_eq!(ctl.stop(Instance(0)), Ok(()));
        assert!(calls(&ctl).is_empty());

        let config = MotorConfig::new(Pin(1), Pin(2)).with_direction(true);
        ctl.init(Instance(0), &config).unwrap();
        ctl.start(Instance(0)).unwrap();
        assert_eq!(ctl.lifecycle(Instance(0)), Ok(Lifecycle::Running));

        ctl.stop(Instance(0)).unwrap();
        assert_eq!(ctl.lifecycle(Instance(0)), Ok(Lifecycle::Stopped));
        assert_eq!(level(&ctl, 1), Some(Level::Low));
        assert_eq!(level(&ctl, 2), Some(Level::Low));

        // Direction comes back on restart
        ctl.start(Instance(0)).unwrap();
        assert_eq!(level(&ctl, 1), Some(Level::High));
        assert_eq!(
            calls(&ctl).as_slice(),
            &[
                Call::Configure(0, 533),
                Call::Resume(0),
                Call::Pause(0),
                Call::Resume(0),
            ]
        );
    }

    #[test]
    fn test_update_rpm_zero_stops() {
        let ctl = controller();
        ctl.init(Instance(0), &MotorConfig::new(Pin(1), Pin(2)))
            .unwrap();
        ctl.start(Instance(0)).unwrap();

        assert_eq!(ctl.update_rpm(Instance(0), 0.0), Ok(()));
        let state = ctl.state(Instance(0)).unwrap();
        assert_eq!(state.lifecycle(), Lifecycle::Stopped);
        assert_eq!(state.config().rpm, 10.0);
        assert_eq!(level(&ctl, 2), Some(Level::Low));
        assert_eq!(calls(&ctl).last(), Some(&Call::Pause(0)));

        // 0.1 rpm is 5 Hz, under the 10 Hz threshold
        ctl.start(Instance(0)).unwrap();
        assert_eq!(ctl.update_rpm(Instance(0), 0.1), Ok(()));
        assert_eq!(ctl.lifecycle(Instance(0)), Ok(Lifecycle::Stopped));
    }

    #[test]
    fn test_update_rpm_preserves_run_state() {
        let ctl = controller();
        ctl.init(Instance(0), &MotorConfig::new(Pin(1), Pin(2)))
            .unwrap();

        ctl.update_rpm(Instance(0), 60.0).unwrap();
        let state = ctl.state(Instance(0)).unwrap();
        assert_eq!(state.lifecycle(), Lifecycle::Stopped);
        assert_eq!(state.config().rpm, 60.0);
        assert_eq!(state.applied(), Some(&3200));

        ctl.start(Instance(0)).unwrap();
        ctl.update_rpm(Instance(0), 30.0).unwrap();
        assert_eq!(ctl.lifecycle(Instance(0)), Ok(Lifecycle::Running));
        assert_eq!(
            calls(&ctl).as_slice(),
            &[
                Call::Configure(0, 533),
                Call::Update(0, 533, 3200, false),
                Call::Resume(0),
                Call::Update(0, 3200, 1600, true),
            ]
        );
    }

    #[test]
    fn test_update_rpm_failure_keeps_stored_speed() {
        let ctl = controller();
        ctl.init(Instance(0), &MotorConfig::new(Pin(1), Pin(2)))
            .unwrap();
        ctl.start(Instance(0)).unwrap();

        // 3200 * 2000 / 60 is above the fake's ceiling
        assert_eq!(
            ctl.update_rpm(Instance(0), 2000.0),
            Err(StepperError::FrequencyUpdateError)
        );
        let state = ctl.state(Instance(0)).unwrap();
        assert_eq!(state.config().rpm, 10.0);
        assert_eq!(state.applied(), Some(&533));
        assert_eq!(state.lifecycle(), Lifecycle::Running);
    }

    #[test]
    fn test_update_rpm_losing_output_stops_instance() {
        let ctl = controller();
        ctl.init(
            Instance(0),
            &MotorConfig::new(Pin(1), Pin(2)).with_direction(true),
        )
        .unwrap();
        ctl.start(Instance(0)).unwrap();
        ctl.with_peripherals(|backend, _| backend.fail_update = true);

        assert_eq!(
            ctl.update_rpm(Instance(0), 60.0),
            Err(StepperError::InternalError)
        );
        let state = ctl.state(Instance(0)).unwrap();
        assert_eq!(state.lifecycle(), Lifecycle::Stopped);
        assert_eq!(state.applied(), None);
        assert_eq!(state.config().rpm, 10.0);
        assert_eq!(level(&ctl, 1), Some(Level::Low));

        // The next speed change programs the instance from scratch
        ctl.with_peripherals(|backend, _| backend.fail_update = false);
        ctl.update_rpm(Instance(0), 60.0).unwrap();
        ctl.start(Instance(0)).unwrap();
        let state = ctl.state(Instance(0)).unwrap();
        assert_eq!(state.applied(), Some(&3200));
        assert_eq!(state.lifecycle(), Lifecycle::Running);
        assert_eq!(
            &calls(&ctl)[2..],
            &[
                Call::Update(0, 533, 3200, true),
                Call::Pause(0),
                Call::Configure(0, 3200),
                Call::Resume(0),
            ]
        );
    }

    #[test]
    fn test_update_rpm_preconditions() {
        let ctl = controller();
        assert_eq!(ctl.update_rpm(Instance(0), 10.0), Err(StepperError::InvalidState));
        assert_eq!(
            ctl.update_rpm(Instance(9), 10.0),
            Err(StepperError::InvalidParameters)
        );

        ctl.init(Instance(0), &MotorConfig::new(Pin(1), Pin(2)))
            .unwrap();
        assert_eq!(
            ctl.update_rpm(Instance(0), -1.0),
            Err(StepperError::InvalidParameters)
        );
        assert_eq!(
            ctl.update_rpm(Instance(0), f32::INFINITY),
            Err(StepperError::InvalidParameters)
        );
    }

    #[test]
    fn test_update_direction() {
        let ctl = controller();

        // Stored only
        ctl.update_direction(Instance(0), true).unwrap();
        assert!(ctl.state(Instance(0)).unwrap().config().direction);
        assert_eq!(level(&ctl, 1), None);

        let config = MotorConfig::with_pairs(&[
            PinPair::new(Pin(1), Pin(2)),
            PinPair::new(Pin(3), Pin(4)),
        ])
        .unwrap();
        ctl.init(Instance(0), &config).unwrap();
        assert_eq!(level(&ctl, 1), Some(Level::Low));

        ctl.update_direction(Instance(0), true).unwrap();
        assert_eq!(level(&ctl, 1), Some(Level::High));
        assert_eq!(level(&ctl, 3), Some(Level::High));
        assert_eq!(level(&ctl, 2), None);

        assert_eq!(
            ctl.update_direction(Instance(4), true),
            Err(StepperError::InvalidParameters)
        );
    }

    #[test]
    fn test_uninit_frees_slot_and_pins() {
        let ctl = controller();
        let config = MotorConfig::new(Pin(1), Pin(2));
        ctl.init(Instance(0), &config).unwrap();
        ctl.start(Instance(0)).unwrap();

        ctl.uninit(Instance(0)).unwrap();
        assert_eq!(ctl.state(Instance(0)).unwrap(), InstanceState::new());
        assert_eq!(calls(&ctl).last(), Some(&Call::Release(0)));
        assert_eq!(level(&ctl, 2), Some(Level::Low));

        // Pins are free again and the slot can be reused
        ctl.init(Instance(1), &config).unwrap();
        ctl.init(Instance(0), &MotorConfig::new(Pin(5), Pin(6)))
            .unwrap();

        assert_eq!(ctl.uninit(Instance(2)), Ok(()));
        assert_eq!(ctl.uninit(Instance(4)), Err(StepperError::InvalidParameters));
    }

    #[test]
    fn test_uninit_failure_keeps_instance() {
        let ctl = controller();
        ctl.init(Instance(0), &MotorConfig::new(Pin(1), Pin(2)))
            .unwrap();
        ctl.with_peripherals(|backend, _| backend.fail_pause = true);

        assert_eq!(ctl.uninit(Instance(0)), Err(StepperError::InternalError));
        assert_eq!(ctl.lifecycle(Instance(0)), Ok(Lifecycle::Stopped));
        // Pins still claimed
        assert_eq!(
            ctl.init(Instance(1), &MotorConfig::new(Pin(1), Pin(9))),
            Err(StepperError::InvalidParameters)
        );
    }

    #[test]
    fn test_init_board_stops_at_first_failure() {
        let ctl = controller();
        let mut board = BoardConfig::new();
        board
            .add(Instance(0), MotorConfig::new(Pin(1), Pin(2)))
            .unwrap();
        board
            .add(Instance(1), MotorConfig::new(Pin(2), Pin(3)))
            .unwrap();
        board
            .add(Instance(2), MotorConfig::new(Pin(4), Pin(5)))
            .unwrap();

        assert_eq!(ctl.init_board(&board), Err(StepperError::InvalidParameters));
        assert_eq!(ctl.lifecycle(Instance(0)), Ok(Lifecycle::Stopped));
        assert_eq!(ctl.lifecycle(Instance(1)), Ok(Lifecycle::Uninitialized));
        assert_eq!(ctl.lifecycle(Instance(2)), Ok(Lifecycle::Uninitialized));
    }
}

use crate::constants::*;
use crate::error::LbResult;
use colored::*;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const DEFAULT_OUTPUT_DIR: &str = "./tmp_khi";
pub const DEFAULT_CASE_NAME: &str = "rayleighTaylor3d";

// ------------------------------------------------------------------------ SNAPSHOT TYPES

/// Voxel annotations written once at the first iteration. Arrays are indexed
/// by the global voxel index.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometrySnapshot {
    pub n: [usize; 3],
    pub materials: Vec<MaterialId>,
    pub partitions: Vec<usize>,
    pub ranks: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhaseField {
    pub density: Vec<Float>,
    pub velocity: Vec<[Float; 3]>,
}

impl PhaseField {
    pub fn new(number_of_voxels: usize) -> Self {
        PhaseField {
            density: vec![0.0; number_of_voxels],
            velocity: vec![[0.0; 3]; number_of_voxels],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSnapshot {
    pub n: [usize; 3],
    pub phases: [PhaseField; 2],
}

// ----------------------------------------------------------------- TRAIT: SnapshotWriter

pub trait SnapshotWriter {
    fn write_geometry(&mut self, geometry: &GeometrySnapshot) -> LbResult<()>;

    fn write_fields(&mut self, iteration: usize, fields: &FieldSnapshot) -> LbResult<()>;

    /// Called once after the last iteration.
    fn finish(&mut self) -> LbResult<()>;
}

/// Discards every snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullWriter;

impl SnapshotWriter for NullWriter {
    fn write_geometry(&mut self, _geometry: &GeometrySnapshot) -> LbResult<()> {
        Ok(())
    }

    fn write_fields(&mut self, _iteration: usize, _fields: &FieldSnapshot) -> LbResult<()> {
        Ok(())
    }

    fn finish(&mut self) -> LbResult<()> {
        Ok(())
    }
}

// --------------------------------------------------------------------- STRUCT: VtkWriter

/// Legacy ASCII VTK files, one per snapshot, plus a `.pvd` master file
/// listing the time series.
#[derive(Debug, Clone)]
pub struct VtkWriter {
    output_dir: PathBuf,
    case_name: String,
    time_series: Vec<(usize, String)>,
}

impl VtkWriter {
    pub fn new<P: AsRef<Path>>(output_dir: P, case_name: &str) -> LbResult<Self> {
        create_output_directory(output_dir.as_ref())?;
        Ok(VtkWriter {
            output_dir: output_dir.as_ref().to_path_buf(),
            case_name: case_name.to_string(),
            time_series: Vec::new(),
        })
    }

    pub fn get_output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn get_time_series(&self) -> &[(usize, String)] {
        &self.time_series
    }

    fn get_field_file_name(&self, iteration: usize) -> String {
        format!("{}_iT{iteration:07}.vtk", self.case_name)
    }

    fn get_master_file_name(&self) -> String {
        format!("{}.pvd", self.case_name)
    }
}

impl SnapshotWriter for VtkWriter {
    fn write_geometry(&mut self, geometry: &GeometrySnapshot) -> LbResult<()> {
        let file_name = format!("{}_geometry.vtk", self.case_name);
        println!("Writing {}.\n", file_name.yellow().bold());
        let mut file = BufWriter::new(File::create(self.output_dir.join(&file_name))?);
        write_header(&mut file, &geometry.n)?;
        write_scalars(&mut file, "material", geometry.materials.iter().map(|&m| m as Float))?;
        write_scalars(&mut file, "cuboid", geometry.partitions.iter().map(|&p| p as Float))?;
        write_scalars(&mut file, "rank", geometry.ranks.iter().map(|&r| r as Float))?;
        file.flush()?;
        Ok(())
    }

    fn write_fields(&mut self, iteration: usize, fields: &FieldSnapshot) -> LbResult<()> {
        let file_name = self.get_field_file_name(iteration);
        println!("Writing {}.\n", file_name.yellow().bold());
        let mut file = BufWriter::new(File::create(self.output_dir.join(&file_name))?);
        write_header(&mut file, &fields.n)?;
        for (phase, name) in fields.phases.iter().zip(["fluid_one", "fluid_two"]) {
            write_scalars(
                &mut file,
                &format!("density_{name}"),
                phase.density.iter().copied(),
            )?;
            write_vectors(&mut file, &format!("velocity_{name}"), &phase.velocity)?;
        }
        file.flush()?;
        self.time_series.push((iteration, file_name));
        Ok(())
    }

    fn finish(&mut self) -> LbResult<()> {
        let file_name = self.get_master_file_name();
        println!("Writing {}.\n", file_name.yellow().bold());
        let mut file = BufWriter::new(File::create(self.output_dir.join(&file_name))?);
        writeln!(file, "<?xml version=\"1.0\"?>")?;
        writeln!(
            file,
            "<VTKFile type=\"Collection\" version=\"0.1\" byte_order=\"LittleEndian\">"
        )?;
        writeln!(file, "  <Collection>")?;
        for (iteration, data_file) in &self.time_series {
            writeln!(
                file,
                "    <DataSet timestep=\"{iteration}\" group=\"\" part=\"0\" file=\"{data_file}\"/>"
            )?;
        }
        writeln!(file, "  </Collection>")?;
        writeln!(file, "</VTKFile>")?;
        file.flush()?;
        Ok(())
    }
}

fn write_header<W: Write>(file: &mut W, n: &[usize; 3]) -> LbResult<()> {
    writeln!(file, "# vtk DataFile Version 3.0")?;
    writeln!(file, "lbtwophase simulation data")?;
    writeln!(file, "ASCII")?;
    writeln!(file, "DATASET STRUCTURED_POINTS")?;
    writeln!(file, "DIMENSIONS {} {} {}", n[0], n[1], n[2])?;
    writeln!(file, "ORIGIN 0 0 0")?;
    writeln!(file, "SPACING 1 1 1")?;
    writeln!(file, "POINT_DATA {}", n.iter().product::<usize>())?;
    Ok(())
}

fn write_scalars<W: Write, I: Iterator<Item = Float>>(
    file: &mut W,
    name: &str,
    values: I,
) -> LbResult<()> {
    writeln!(file, "SCALARS {name} float 1")?;
    writeln!(file, "LOOKUP_TABLE default")?;
    for value in values {
        writeln!(file, "{value:.8e}")?;
    }
    Ok(())
}

fn write_vectors<W: Write>(file: &mut W, name: &str, values: &[[Float; 3]]) -> LbResult<()> {
    writeln!(file, "VECTORS {name} float")?;
    for value in values {
        writeln!(file, "{:.8e} {:.8e} {:.8e}", value[0], value[1], value[2])?;
    }
    Ok(())
}

pub fn create_output_directory(path: &Path) -> LbResult<()> {
    if !path.exists() {
        println!(
            "Creating the {} path.\n",
            path.display().to_string().yellow().bold()
        );
        fs::create_dir_all(path)?;
    } else {
        println!(
            "The {} path already exists.\n",
            path.display().to_string().yellow().bold()
        );
    }
    Ok(())
}
